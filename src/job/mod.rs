//! # Job Controller
//!
//! Drives one expansion job through its lifecycle: sweep, materialization,
//! and publication to the shared output feature list. Tracks progress and
//! honours cooperative cancellation. Failures end in a terminal status with
//! a message instead of crossing the job boundary.

mod cancel;
mod controller;
mod feature_list;
mod state;

pub use cancel::{CancellationToken, Cancelled};
pub use controller::{ExpansionJob, JobHandle, JobSettings};
pub use feature_list::{FeatureList, FeatureListCollector, PublishError, RowSender, RowSink};
pub use state::{JobState, JobStatus};
