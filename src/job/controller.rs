use std::sync::Arc;

use log::{debug, warn};

use crate::series::SeriesMaterializer;
use crate::source::{DataMode, Frame, MobilityScanDataAccess, RawDataFileRef};
use crate::sweep::{sweep, SweepOutcome};
use crate::trace::TraceArena;

use super::cancel::{CancellationToken, Cancelled};
use super::feature_list::RowSink;
use super::state::{JobState, JobStatus};

/// Settings shared by every job of one expansion.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Name used in descriptions and logs (usually the output list name)
    pub name: String,
    /// Raw data file the frames belong to
    pub raw_file: RawDataFileRef,
    /// Point list to sweep
    pub mode: DataMode,
    /// Noise floor for raw mode
    pub noise_level: f64,
    /// Bin width for summed mobilograms
    pub mobility_bin_width: Option<f64>,
}

/// Read-only view of a job for progress polling and cancellation.
#[derive(Debug, Clone)]
pub struct JobHandle {
    state: Arc<JobState>,
    cancel: CancellationToken,
}

impl JobHandle {
    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Finished fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.state.progress()
    }

    /// Description of the current activity.
    pub fn description(&self) -> String {
        self.state.description()
    }

    /// Error message if the job failed.
    pub fn error_message(&self) -> Option<String> {
        self.state.error_message()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Counters and status of the job.
    pub fn state(&self) -> &JobState {
        &self.state
    }
}

/// One unit of work: sweeps a set of frames over one slice of traces,
/// materializes the result, and publishes it to the output list.
///
/// Runs single-threaded; no error leaves [`ExpansionJob::run`]. Callers poll
/// the terminal status and message through a [`JobHandle`].
pub struct ExpansionJob<'a> {
    settings: Arc<JobSettings>,
    frames: &'a [Frame],
    arena: Option<TraceArena>,
    state: Arc<JobState>,
    cancel: CancellationToken,
}

impl<'a> ExpansionJob<'a> {
    /// Create a job over `frames` and the traces in `arena`.
    pub fn new(
        settings: Arc<JobSettings>,
        frames: &'a [Frame],
        arena: TraceArena,
        cancel: CancellationToken,
    ) -> Self {
        let description = format!("{}: waiting", settings.name);
        Self {
            settings,
            frames,
            arena: Some(arena),
            state: Arc::new(JobState::new(description)),
            cancel,
        }
    }

    /// Handle for polling and cancelling this job.
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
        }
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Run the job to a terminal status, appending rows to `output` on success.
    pub fn run(&mut self, output: &dyn RowSink) {
        let Some(mut arena) = self.arena.take() else {
            return;
        };
        if self.cancel.is_cancelled() {
            self.state.transition(JobStatus::Cancelled);
            return;
        }
        if !self.state.transition(JobStatus::Processing) {
            return;
        }

        let name = &self.settings.name;
        let mz_span = arena
            .mz_span()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut access = MobilityScanDataAccess::new(
            self.frames,
            self.settings.mode,
            self.settings.noise_level,
        );
        let total_frames = self.frames.len();
        let total_traces = arena.len();
        self.state.set_totals(total_frames, total_traces);
        self.state.set_description(format!(
            "{name}: expanding traces for frame 0/{total_frames} m/z range: {mz_span}"
        ));
        debug!("{name}: expanding {total_traces} traces over {total_frames} frames (m/z {mz_span})");

        let state = &self.state;
        let outcome = sweep(&mut access, &mut arena, &self.cancel, |processed, total| {
            state.set_frames_processed(processed);
            state.set_description(format!(
                "{name}: expanding traces for frame {processed}/{total} m/z range: {mz_span}"
            ));
        });

        match outcome {
            Ok(SweepOutcome::Completed) => {}
            Ok(SweepOutcome::Cancelled) => {
                debug!("{name}: cancelled during sweep");
                state.transition(JobStatus::Cancelled);
                return;
            }
            Err(e) => {
                warn!("{name}: {e}");
                state.fail(e.to_string());
                return;
            }
        }

        let materializer =
            SeriesMaterializer::new(self.settings.raw_file.clone(), self.settings.mobility_bin_width);
        let rows = match materializer.materialize_all(arena.into_traces(), &self.cancel, |done, total| {
            state.set_traces_materialized(done);
            state.set_description(format!("{name}: creating new features {done}/{total}"));
        }) {
            Ok(rows) => rows,
            Err(Cancelled) => {
                debug!("{name}: cancelled while creating features");
                state.transition(JobStatus::Cancelled);
                return;
            }
        };

        let num_rows = rows.len();
        if let Err(e) = output.append_rows(rows) {
            warn!("{name}: {e}");
            state.fail(e.to_string());
            return;
        }

        debug!("{name}: published {num_rows} of {total_traces} traces");
        state.set_description(format!("{name}: published {num_rows} features"));
        state.transition(JobStatus::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FeatureList;
    use crate::source::{MobilityScan, PeakArrays};
    use crate::trace::{CandidateTrace, MzRange};

    fn settings(mode: DataMode) -> Arc<JobSettings> {
        Arc::new(JobSettings {
            name: "test".to_string(),
            raw_file: RawDataFileRef::new("run.d"),
            mode,
            noise_level: 0.0,
            mobility_bin_width: None,
        })
    }

    fn frames(with_raw: bool) -> Vec<Frame> {
        (0..2)
            .map(|f| {
                let scans = (0..2)
                    .map(|s| {
                        let scan = MobilityScan::new(s, 1.0, PeakArrays::new(vec![100.01], vec![10.0]));
                        if with_raw {
                            scan.with_raw_peaks(PeakArrays::new(vec![100.01], vec![10.0]))
                        } else {
                            scan
                        }
                    })
                    .collect();
                Frame::new(f, f as f64, scans)
            })
            .collect()
    }

    fn arena() -> TraceArena {
        TraceArena::new(vec![CandidateTrace::new(7, MzRange::new(100.0, 100.05).unwrap())])
    }

    #[test]
    fn test_job_finishes_and_publishes() {
        let frames = frames(false);
        let output = FeatureList::new("out");
        let mut job = ExpansionJob::new(settings(DataMode::Centroid), &frames, arena(), CancellationToken::new());
        let handle = job.handle();
        assert_eq!(handle.status(), JobStatus::Waiting);

        job.run(&output);
        assert_eq!(handle.status(), JobStatus::Finished);
        assert_eq!(handle.progress(), 1.0);
        assert_eq!(handle.state().frame_counts(), (2, 2));
        assert_eq!(handle.state().trace_counts(), (1, 1));
        assert_eq!(output.len(), 1);
        assert_eq!(output.rows()[0].series.num_scans(), 4);

        // a second run is a no-op
        job.run(&output);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_job_cancelled_before_start() {
        let frames = frames(false);
        let output = FeatureList::new("out");
        let mut job = ExpansionJob::new(settings(DataMode::Centroid), &frames, arena(), CancellationToken::new());
        job.handle().cancel();
        job.run(&output);
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(output.is_empty());
    }

    #[test]
    fn test_missing_peak_list_is_terminal_error() {
        let frames = frames(false);
        let output = FeatureList::new("out");
        let mut job = ExpansionJob::new(settings(DataMode::Raw), &frames, arena(), CancellationToken::new());
        let handle = job.handle();
        job.run(&output);

        assert_eq!(handle.status(), JobStatus::Error);
        assert!(handle.error_message().unwrap().contains("Missing peak list"));
        assert!(output.is_empty());
    }

    #[test]
    fn test_raw_mode_with_raw_data() {
        let frames = frames(true);
        let output = FeatureList::new("out");
        let mut job = ExpansionJob::new(settings(DataMode::Raw), &frames, arena(), CancellationToken::new());
        job.run(&output);
        assert_eq!(job.status(), JobStatus::Finished);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_cancel_while_running_publishes_nothing() {
        let frames: Vec<Frame> = (0..5_000)
            .map(|f| {
                let scans = (0..4)
                    .map(|s| MobilityScan::new(s, 1.0, PeakArrays::new(vec![100.01], vec![10.0])))
                    .collect();
                Frame::new(f, f as f64, scans)
            })
            .collect();

        let mut cancelled = 0;
        for _ in 0..20 {
            let output = FeatureList::new("out");
            let mut job = ExpansionJob::new(settings(DataMode::Centroid), &frames, arena(), CancellationToken::new());
            let handle = job.handle();
            std::thread::scope(|scope| {
                scope.spawn(|| job.run(&output));
                while handle.state().frame_counts().0 == 0 && !handle.status().is_terminal() {
                    std::hint::spin_loop();
                }
                handle.cancel();
            });

            // whichever stage the cancel reached, the output is all or nothing
            match handle.status() {
                JobStatus::Cancelled => {
                    assert!(output.is_empty());
                    assert!(handle.error_message().is_none());
                    cancelled += 1;
                }
                status => {
                    assert_eq!(status, JobStatus::Finished);
                    assert_eq!(output.len(), 1);
                }
            }
        }
        assert!(cancelled > 0);
    }
}
