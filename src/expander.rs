//! # Parallel trace expansion
//!
//! Builds candidate traces from an input feature list, slices them into
//! disjoint m/z partitions, and runs one [`ExpansionJob`] per partition on
//! the rayon pool. All jobs sweep the same frames and publish into the same
//! output sink. Partitions are only cut at gaps between windows, so a data
//! point is never contested by traces of two jobs and the result does not
//! depend on the number of jobs.
//!
//! ```text
//! features ──▶ TraceArena ──split()──▶ ┌────────┐
//!                                      │ Job 0  │──┐
//!                                      │ Job 1  │──┼──▶ RowSink
//!                                      │ Job N  │──┘
//!                                      └────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ExpanderConfig;
use crate::error::ExpanderError;
use crate::job::{CancellationToken, ExpansionJob, JobHandle, JobSettings, JobStatus, RowSink};
use crate::source::{Frame, RawDataFile, RawDataFileRef};
use crate::trace::{CandidateTrace, TraceArena};

/// A feature from upstream detection to be expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFeature {
    /// Feature (row) id
    pub id: u64,
    /// Representative m/z
    pub mz: f64,
    /// Restrict expansion to frames within this retention time window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_range: Option<(f64, f64)>,
    /// Restrict expansion to mobility scans within this mobility window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobility_range: Option<(f64, f64)>,
}

impl InputFeature {
    /// Feature without retention time or mobility restrictions.
    pub fn new(id: u64, mz: f64) -> Self {
        Self {
            id,
            mz,
            rt_range: None,
            mobility_range: None,
        }
    }

    /// Load a feature list from JSON (an array of features).
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<Self>, ExpanderError> {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

/// Final status of every job of one expansion.
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionReport {
    /// Per-job status and error message, in m/z order
    pub jobs: Vec<JobReport>,
    /// Number of candidate traces expanded
    pub num_traces: usize,
    /// Wall-clock time in seconds
    pub elapsed_seconds: f64,
}

/// Terminal state of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Job status
    pub status: JobStatus,
    /// Error message when the job failed
    pub error_message: Option<String>,
}

impl ExpansionReport {
    /// Combined status: any error wins over cancellation, which wins over success.
    pub fn status(&self) -> JobStatus {
        let statuses = || self.jobs.iter().map(|j| j.status);
        if statuses().any(|s| s == JobStatus::Error) {
            JobStatus::Error
        } else if statuses().any(|s| s == JobStatus::Cancelled) {
            JobStatus::Cancelled
        } else if statuses().all(|s| s == JobStatus::Finished) {
            JobStatus::Finished
        } else {
            JobStatus::Processing
        }
    }

    /// Error messages of all failed jobs.
    pub fn errors(&self) -> Vec<&str> {
        self.jobs
            .iter()
            .filter_map(|j| j.error_message.as_deref())
            .collect()
    }
}

/// Entry point for expanding a feature list against one raw data file.
#[derive(Debug, Clone)]
pub struct ImsExpander {
    config: ExpanderConfig,
}

impl ImsExpander {
    /// Create an expander after validating `config`.
    pub fn new(config: ExpanderConfig) -> Result<Self, ExpanderError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings in use.
    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    /// Build the sorted candidate traces for `features`.
    pub fn build_traces(&self, features: &[InputFeature]) -> Result<TraceArena, ExpanderError> {
        let tolerance = self.config.tolerance();
        let traces = features
            .iter()
            .map(|feature| {
                let mut trace = CandidateTrace::new(feature.id, tolerance.range_around(feature.mz)?);
                if let Some((lo, hi)) = feature.rt_range {
                    trace = trace.with_rt_window(lo..=hi);
                }
                if let Some((lo, hi)) = feature.mobility_range {
                    trace = trace.with_mobility_window(lo..=hi);
                }
                Ok(trace)
            })
            .collect::<Result<Vec<_>, ExpanderError>>()?;
        Ok(TraceArena::new(traces))
    }

    /// Prepare the jobs expanding `features` over `raw`.
    ///
    /// `raw` is validated first; malformed peak arrays are rejected here
    /// rather than inside a running job.
    pub fn prepare<'a>(
        &self,
        name: impl Into<String>,
        raw: &'a RawDataFile,
        features: &[InputFeature],
        cancel: &CancellationToken,
    ) -> Result<ExpansionTask<'a>, ExpanderError> {
        raw.validate()?;
        let arena = self.build_traces(features)?;
        Ok(self.prepare_traces(name, raw.file_ref(), &raw.frames, arena, cancel))
    }

    /// Prepare jobs for already built traces.
    pub fn prepare_traces<'a>(
        &self,
        name: impl Into<String>,
        raw_file: RawDataFileRef,
        frames: &'a [Frame],
        arena: TraceArena,
        cancel: &CancellationToken,
    ) -> ExpansionTask<'a> {
        let settings = Arc::new(JobSettings {
            name: name.into(),
            raw_file,
            mode: self.config.data_mode(),
            noise_level: self.config.noise_level,
            mobility_bin_width: self.config.mobility_bin_width,
        });
        let num_traces = arena.len();
        let jobs = arena
            .split(self.config.num_jobs)
            .into_iter()
            .map(|part| ExpansionJob::new(Arc::clone(&settings), frames, part, cancel.clone()))
            .collect();

        ExpansionTask {
            name: settings.name.clone(),
            jobs,
            num_traces,
        }
    }
}

/// The set of jobs of one expansion, ready to run.
pub struct ExpansionTask<'a> {
    name: String,
    jobs: Vec<ExpansionJob<'a>>,
    num_traces: usize,
}

impl<'a> ExpansionTask<'a> {
    /// Handles of all jobs, for polling from another thread.
    pub fn handles(&self) -> TaskHandles {
        TaskHandles {
            jobs: self.jobs.iter().map(ExpansionJob::handle).collect(),
        }
    }

    /// Number of jobs.
    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Run every job on the rayon pool and wait for all of them.
    pub fn run(mut self, output: &dyn RowSink) -> ExpansionReport {
        let start = Instant::now();
        info!(
            "{}: expanding {} traces in {} jobs",
            self.name,
            self.num_traces,
            self.jobs.len()
        );

        self.jobs.par_iter_mut().for_each(|job| job.run(output));

        let jobs: Vec<JobReport> = self
            .jobs
            .iter()
            .map(|job| {
                let handle = job.handle();
                JobReport {
                    status: handle.status(),
                    error_message: handle.error_message(),
                }
            })
            .collect();
        let report = ExpansionReport {
            jobs,
            num_traces: self.num_traces,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };
        info!(
            "{}: expansion {} in {:.2}s",
            self.name,
            report.status(),
            report.elapsed_seconds
        );
        report
    }
}

/// Polling view over all jobs of a task.
#[derive(Debug, Clone)]
pub struct TaskHandles {
    jobs: Vec<JobHandle>,
}

impl TaskHandles {
    /// Mean progress of all jobs; 1 when there are none.
    pub fn progress(&self) -> f64 {
        if self.jobs.is_empty() {
            return 1.0;
        }
        self.jobs.iter().map(JobHandle::progress).sum::<f64>() / self.jobs.len() as f64
    }

    /// Whether every job reached a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.jobs.iter().all(|j| j.status().is_terminal())
    }

    /// Cancel every job.
    pub fn cancel(&self) {
        self.jobs.iter().for_each(JobHandle::cancel);
    }

    /// Individual job handles.
    pub fn jobs(&self) -> &[JobHandle] {
        &self.jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_jobs: usize) -> ExpanderConfig {
        ExpanderConfig {
            num_jobs,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_traces_sorted_with_windows() {
        let expander = ImsExpander::new(config(1)).unwrap();
        let mut late = InputFeature::new(1, 500.0);
        late.rt_range = Some((10.0, 20.0));
        let arena = expander
            .build_traces(&[late, InputFeature::new(2, 300.0)])
            .unwrap();

        let ids: Vec<u64> = arena.traces().iter().map(|t| t.feature_id()).collect();
        assert_eq!(ids, vec![2, 1]);
        let range = arena.traces()[0].mz_range();
        assert!((range.lo() - 299.995).abs() < 1e-9);
        assert!((range.hi() - 300.005).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ImsExpander::new(config(0)).is_err());
    }

    #[test]
    fn test_invalid_feature_mz_rejected() {
        let expander = ImsExpander::new(config(1)).unwrap();
        assert!(expander.build_traces(&[InputFeature::new(1, f64::NAN)]).is_err());
    }

    #[test]
    fn test_prepare_splits_into_jobs() {
        let expander = ImsExpander::new(config(3)).unwrap();
        let raw = RawDataFile::new("run.d", vec![]);
        let features: Vec<InputFeature> = (0..10).map(|i| InputFeature::new(i, 100.0 + i as f64)).collect();
        let task = expander
            .prepare("out", &raw, &features, &CancellationToken::new())
            .unwrap();
        assert_eq!(task.num_jobs(), 3);
        assert_eq!(task.handles().progress(), 0.0);
        assert!(!task.handles().all_terminal());
    }

    #[test]
    fn test_prepare_rejects_malformed_raw_data() {
        use crate::source::{Frame, MobilityScan, PeakArrays, SourceError};

        let expander = ImsExpander::new(config(2)).unwrap();
        let raw = RawDataFile::new(
            "run.d",
            vec![Frame::new(
                0,
                1.0,
                vec![MobilityScan::new(0, 1.0, PeakArrays::new(vec![100.0, 100.01], vec![1.0]))],
            )],
        );
        let result = expander.prepare(
            "out",
            &raw,
            &[InputFeature::new(1, 100.0)],
            &CancellationToken::new(),
        );
        assert!(matches!(
            result,
            Err(ExpanderError::SourceError(SourceError::InvalidData(_)))
        ));
    }

    #[test]
    fn test_report_status() {
        let report = |statuses: &[JobStatus]| ExpansionReport {
            jobs: statuses
                .iter()
                .map(|&status| JobReport {
                    status,
                    error_message: None,
                })
                .collect(),
            num_traces: 0,
            elapsed_seconds: 0.0,
        };
        assert_eq!(report(&[]).status(), JobStatus::Finished);
        assert_eq!(report(&[JobStatus::Finished, JobStatus::Cancelled]).status(), JobStatus::Cancelled);
        assert_eq!(report(&[JobStatus::Cancelled, JobStatus::Error]).status(), JobStatus::Error);
    }
}
