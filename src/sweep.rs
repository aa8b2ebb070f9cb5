//! # Sweep Engine
//!
//! Distributes the points of every mobility scan over the candidate traces.
//!
//! Traces are sorted by lower m/z bound and points within a mobility scan are
//! m/z ascending, so one cursor per mobility scan walks both lists together:
//!
//! 1. Raw-mode points below the noise floor are skipped.
//! 2. The cursor advances past traces whose upper bound is below the point.
//! 3. A point below the cursor trace's lower bound matches nothing and is
//!    skipped; the cursor never moves backwards.
//! 4. A point inside the cursor trace is offered to it; if rejected (the
//!    trace already holds a point for this mobility scan) the cursor moves to
//!    the next trace as long as that one still contains the point.
//!
//! With overlapping windows this assigns each point to the lowest-indexed
//! trace that accepts it. The cursor restarts at the first trace for every
//! mobility scan.
//!
//! Cost is linear in points plus cursor moves. Because the cursor only moves
//! forward within a mobility scan, heavily overlapping windows can make step 4
//! walk far; windows built from a fixed tolerance overlap only their
//! neighbours.

use log::debug;

use crate::job::CancellationToken;
use crate::source::{DataMode, ScanDataSource, SourceError};
use crate::trace::{CandidateTrace, TraceArena};

/// How a sweep ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every frame was processed.
    Completed,
    /// Cancellation was observed at a frame boundary; accumulators were discarded.
    Cancelled,
}

/// Sweep every frame of `access` over the traces of `arena`.
///
/// `on_frame` is called after each frame with `(frames processed, total frames)`.
/// The source's noise floor only applies when it exposes raw points.
/// Cancellation is checked once per frame. On cancellation or error every
/// accumulator in `arena` is dropped, so no partial trace survives.
pub fn sweep<S, F>(
    access: &mut S,
    arena: &mut TraceArena,
    cancel: &CancellationToken,
    mut on_frame: F,
) -> Result<SweepOutcome, SourceError>
where
    S: ScanDataSource + ?Sized,
    F: FnMut(usize, usize),
{
    let total_frames = access.frame_count();
    let noise_level = match access.mode() {
        DataMode::Raw => access.noise_level(),
        DataMode::Centroid => None,
    };
    let mut processed = 0;

    loop {
        if cancel.is_cancelled() {
            debug!("Sweep cancelled after {processed}/{total_frames} frames");
            arena.clear();
            return Ok(SweepOutcome::Cancelled);
        }

        match access.next_frame() {
            Ok(_) => {}
            Err(SourceError::EndOfData) => break,
            Err(e) => {
                arena.clear();
                return Err(e);
            }
        }

        while access.has_next_mobility_scan() {
            if let Err(e) = access.next_mobility_scan() {
                arena.clear();
                return Err(e);
            }
            assign_points(&*access, arena.traces_mut(), noise_level);
        }

        processed += 1;
        on_frame(processed, total_frames);
    }

    Ok(SweepOutcome::Completed)
}

/// Offer the points of the current mobility scan to `traces`.
pub fn assign_points<S>(access: &S, traces: &mut [CandidateTrace], noise_level: Option<f64>)
where
    S: ScanDataSource + ?Sized,
{
    let Some(last) = traces.len().checked_sub(1) else {
        return;
    };

    let mut trace_index = 0;
    for point_index in 0..access.point_count() {
        if let Some(noise) = noise_level {
            if access.intensity_at(point_index) < noise {
                continue;
            }
        }
        let mz = access.mz_at(point_index);

        while trace_index < last && traces[trace_index].mz_range().hi() < mz {
            trace_index += 1;
        }
        let range = traces[trace_index].mz_range();
        if range.hi() < mz {
            // past the last trace; no later point can match either
            break;
        }
        if range.lo() > mz {
            continue;
        }

        while traces[trace_index].mz_range().contains(mz)
            && !traces[trace_index].try_accept(access, point_index)
            && trace_index < last
        {
            trace_index += 1;
        }
    }
}
