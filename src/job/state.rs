use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// Lifecycle of an expansion job.
///
/// `Waiting → Processing → {Finished | Error | Cancelled}`. A job cancelled or
/// failed before it starts goes straight from `Waiting` to the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum JobStatus {
    /// Created, not started
    Waiting,
    /// Sweeping or materializing
    Processing,
    /// Rows were published
    Finished,
    /// A fatal error stopped the job; see the error message
    Error,
    /// Stopped on request; nothing was published
    Cancelled,
}

impl JobStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Cancelled)
    }

    fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Waiting, Self::Processing) => true,
            (Self::Waiting, Self::Error | Self::Cancelled) => true,
            (Self::Processing, next) => next.is_terminal(),
            _ => false,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Processing => 1,
            Self::Finished => 2,
            Self::Error => 3,
            Self::Cancelled => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Waiting,
            1 => Self::Processing,
            2 => Self::Finished,
            3 => Self::Error,
            _ => Self::Cancelled,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Processing => "processing",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Status, counters, and messages of one job.
///
/// Written only by the thread running the job; any thread may read it.
/// Reads are eventually consistent.
#[derive(Debug)]
pub struct JobState {
    status: AtomicU8,
    frames_processed: AtomicUsize,
    total_frames: AtomicUsize,
    traces_materialized: AtomicUsize,
    total_traces: AtomicUsize,
    description: RwLock<String>,
    error_message: RwLock<Option<String>>,
}

impl JobState {
    /// Fresh state in [`JobStatus::Waiting`].
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            status: AtomicU8::new(JobStatus::Waiting.to_u8()),
            frames_processed: AtomicUsize::new(0),
            total_frames: AtomicUsize::new(0),
            traces_materialized: AtomicUsize::new(0),
            total_traces: AtomicUsize::new(0),
            description: RwLock::new(description.into()),
            error_message: RwLock::new(None),
        }
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Move to `next` if the lifecycle allows it. Returns whether the
    /// transition happened.
    pub fn transition(&self, next: JobStatus) -> bool {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            if !JobStatus::from_u8(current).can_transition_to(next) {
                return false;
            }
            match self.status.compare_exchange_weak(
                current,
                next.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Record a fatal error and move to [`JobStatus::Error`].
    ///
    /// The message slot stays write-locked across the transition, so a
    /// reader that observes `Error` always finds the message.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let mut slot = self
            .error_message
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.transition(JobStatus::Error) {
            return false;
        }
        *slot = Some(message.into());
        true
    }

    /// Error message of a failed job.
    pub fn error_message(&self) -> Option<String> {
        self.error_message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Human-readable description of the current activity.
    pub fn description(&self) -> String {
        self.description
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_description(&self, description: String) {
        *self
            .description
            .write()
            .unwrap_or_else(PoisonError::into_inner) = description;
    }

    pub(crate) fn set_totals(&self, frames: usize, traces: usize) {
        self.total_frames.store(frames, Ordering::Release);
        self.total_traces.store(traces, Ordering::Release);
    }

    pub(crate) fn set_frames_processed(&self, processed: usize) {
        self.frames_processed.fetch_max(processed, Ordering::AcqRel);
    }

    pub(crate) fn set_traces_materialized(&self, materialized: usize) {
        self.traces_materialized
            .fetch_max(materialized, Ordering::AcqRel);
    }

    /// `(frames processed, total frames)`.
    pub fn frame_counts(&self) -> (usize, usize) {
        (
            self.frames_processed.load(Ordering::Acquire),
            self.total_frames.load(Ordering::Acquire),
        )
    }

    /// `(traces materialized, total traces)`.
    pub fn trace_counts(&self) -> (usize, usize) {
        (
            self.traces_materialized.load(Ordering::Acquire),
            self.total_traces.load(Ordering::Acquire),
        )
    }

    /// Finished fraction in `[0, 1]`: half for the sweep, half for
    /// materialization. A finished job reports 1.
    pub fn progress(&self) -> f64 {
        if self.status() == JobStatus::Finished {
            return 1.0;
        }
        let (frames_done, frames_total) = self.frame_counts();
        let (traces_done, traces_total) = self.trace_counts();
        let progress = 0.5 * fraction(frames_done, frames_total) + 0.5 * fraction(traces_done, traces_total);
        progress.clamp(0.0, 1.0)
    }
}

fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let state = JobState::new("job");
        assert_eq!(state.status(), JobStatus::Waiting);
        assert!(!state.transition(JobStatus::Finished));
        assert!(state.transition(JobStatus::Processing));
        assert!(!state.transition(JobStatus::Processing));
        assert!(state.transition(JobStatus::Finished));
        assert!(!state.transition(JobStatus::Cancelled));
        assert!(!state.fail("late"));
        assert_eq!(state.status(), JobStatus::Finished);
        assert_eq!(state.error_message(), None);
    }

    #[test]
    fn test_cancel_before_start() {
        let state = JobState::new("job");
        assert!(state.transition(JobStatus::Cancelled));
        assert!(!state.transition(JobStatus::Processing));
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_fail_records_message() {
        let state = JobState::new("job");
        state.transition(JobStatus::Processing);
        assert!(state.fail("missing peak list"));
        assert_eq!(state.status(), JobStatus::Error);
        assert_eq!(state.error_message().as_deref(), Some("missing peak list"));
    }

    #[test]
    fn test_fail_after_terminal_status_leaves_no_message() {
        let state = JobState::new("job");
        state.transition(JobStatus::Processing);
        state.transition(JobStatus::Finished);
        assert!(!state.fail("too late"));
        assert_eq!(state.status(), JobStatus::Finished);
        assert_eq!(state.error_message(), None);

        let failed = JobState::new("job");
        assert!(failed.fail("first"));
        assert!(!failed.fail("second"));
        assert_eq!(failed.error_message().as_deref(), Some("first"));
    }

    #[test]
    fn test_error_status_never_observed_without_message() {
        let state = JobState::new("job");
        state.transition(JobStatus::Processing);
        std::thread::scope(|scope| {
            scope.spawn(|| loop {
                if state.status() == JobStatus::Error {
                    assert!(state.error_message().is_some());
                    break;
                }
                std::thread::yield_now();
            });
            assert!(state.fail("scan 3 has no peak list"));
        });
    }

    #[test]
    fn test_progress_weights_and_monotonicity() {
        let state = JobState::new("job");
        state.transition(JobStatus::Processing);
        state.set_totals(4, 10);
        assert_eq!(state.progress(), 0.0);

        state.set_frames_processed(2);
        assert!((state.progress() - 0.25).abs() < 1e-12);
        // counters never move backwards
        state.set_frames_processed(1);
        assert!((state.progress() - 0.25).abs() < 1e-12);

        state.set_frames_processed(4);
        state.set_traces_materialized(5);
        assert!((state.progress() - 0.75).abs() < 1e-12);

        state.transition(JobStatus::Finished);
        assert_eq!(state.progress(), 1.0);
    }
}
