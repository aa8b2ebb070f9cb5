//! # ims-expander - Ion Mobility Trace Expansion
//!
//! `ims_expander` takes features found by a coarse upstream detection step,
//! each described by a narrow m/z window, and re-expands them against the
//! complete raw ion mobility acquisition. Every frame and every mobility scan
//! is swept once; each data point is handed to the candidate traces whose
//! window contains it. The result is one dense ion mobilogram time series per
//! feature, published to a shared output feature list.
//!
//! ## Key Features
//!
//! - **Single sweep**: One cursor pass per mobility scan over m/z-sorted
//!   points and windows, without per-point searches.
//!
//! - **Parallel jobs**: The sorted traces are cut into disjoint m/z slices,
//!   each expanded by an independent job on the rayon pool.
//!
//! - **Cooperative cancellation**: Jobs check a shared token once per frame
//!   and never publish partial results.
//!
//! - **Raw or centroid data**: Sweep raw profile points with a noise floor,
//!   or the centroided peak lists.
//!
//! - **Parquet export**: Expanded features can be written to a wide-format
//!   Parquet file with per-frame traces and summed mobilograms.
//!
//! ## Quick Start
//!
//! ```rust
//! use ims_expander::prelude::*;
//!
//! let frames = (0..3)
//!     .map(|f| {
//!         let scans = (0..2)
//!             .map(|s| MobilityScan::new(s, 1.0 - 0.01 * s as f64, PeakArrays::new(vec![400.001], vec![10.0])))
//!             .collect();
//!         Frame::new(f, f as f64 * 1.5, scans)
//!     })
//!     .collect();
//! let raw = RawDataFile::new("run01.d", frames);
//!
//! let expander = ImsExpander::new(ExpanderConfig { num_jobs: 2, ..Default::default() })?;
//! let features = vec![InputFeature::new(1, 400.0)];
//! let output = FeatureList::new("run01 expanded");
//!
//! let task = expander.prepare("run01", &raw, &features, &CancellationToken::new())?;
//! let report = task.run(&output);
//!
//! assert_eq!(report.status(), JobStatus::Finished);
//! assert_eq!(output.rows()[0].series.num_scans(), 6);
//! # Ok::<(), ims_expander::error::ExpanderError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`source`]: Frames, mobility scans, and the cursor-style scan data access
//! - [`trace`]: Candidate traces and their sorted arena
//! - [`sweep`]: The frame-by-frame sweep assigning points to traces
//! - [`series`]: Materialization of expanded traces into feature rows
//! - [`job`]: Job lifecycle, progress, cancellation, and the output list
//! - [`expander`]: Partitioning into parallel jobs
//! - [`config`]: TOML configuration
//! - [`mobilogram_writer`]: Parquet export (feature `parquet-export`)

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod expander;
pub mod job;
pub mod series;
pub mod source;
pub mod sweep;
pub mod trace;

#[cfg(feature = "parquet-export")]
pub mod mobilogram_writer;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ConfigError, ExpanderConfig};
    pub use crate::error::ExpanderError;
    pub use crate::expander::{ExpansionReport, ExpansionTask, ImsExpander, InputFeature, TaskHandles};
    pub use crate::job::{
        CancellationToken, ExpansionJob, FeatureList, FeatureListCollector, JobHandle, JobStatus,
        RowSink,
    };
    #[cfg(feature = "parquet-export")]
    pub use crate::mobilogram_writer::{
        MobilogramWriter, MobilogramWriterConfig, MobilogramWriterStats,
    };
    pub use crate::series::{FeatureRow, FeatureSummary, IonMobilogramTimeSeries, SummedMobilogram};
    pub use crate::source::{
        DataMode, Frame, MobilityScan, MobilityScanDataAccess, PeakArrays, RawDataFile,
        ScanDataSource, SourceError,
    };
    pub use crate::sweep::{sweep, SweepOutcome};
    pub use crate::trace::{CandidateTrace, MzRange, MzTolerance, TraceArena};
}
