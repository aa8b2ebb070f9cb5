//! # Scan Data Source
//!
//! Ordered access to the frames of one ion mobility acquisition. Each frame
//! holds ordered mobility scans, each mobility scan an m/z-ascending point
//! array. The data mode (raw or centroid) and the noise floor are fixed when
//! the access is constructed.

mod access;
mod error;
mod frame;

pub use access::{
    DataMode, FrameInfo, MobilityScanDataAccess, MobilityScanInfo, ScanDataSource, ScanKey,
};
pub use error::SourceError;
pub use frame::{Frame, MobilityScan, PeakArrays, RawDataFile, RawDataFileRef};
