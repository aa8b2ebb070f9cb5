//! Error types for scan data access.

use thiserror::Error;

/// Errors that can occur while reading frames and mobility scans.
#[derive(Error, Debug)]
pub enum SourceError {
    /// All frames have been consumed. This is the normal loop-termination
    /// signal and is never surfaced to the user.
    #[error("End of data")]
    EndOfData,

    /// A mobility scan was requested before a frame was selected, or after
    /// the current frame ran out of mobility scans.
    #[error("No mobility scan available in the current frame")]
    NoMobilityScan,

    /// Raw data was requested for a mobility scan that carries no raw peak list.
    #[error("Missing peak list: frame {frame_index}, mobility scan {scan_number} has no raw data points")]
    MissingPeakList {
        /// Index of the frame containing the scan
        frame_index: usize,
        /// Scan number of the mobility scan within the frame
        scan_number: usize,
    },

    /// Malformed frame or scan data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error deserializing a raw data file
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}
