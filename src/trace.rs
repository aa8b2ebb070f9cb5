//! # Candidate Traces
//!
//! A candidate trace is one coarsely detected ion signal: an m/z window plus
//! an accumulator of the data points accepted from the raw acquisition,
//! at most one per mobility scan. Traces live in a [`TraceArena`] sorted by
//! the lower bound of their m/z window; the arena owns every accumulator
//! until materialization consumes it.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::ExpanderError;
use crate::source::{MobilityScanInfo, ScanDataSource, ScanKey};

/// Closed, non-degenerate m/z interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzRange {
    lo: f64,
    hi: f64,
}

impl MzRange {
    /// Create a range; fails unless both bounds are finite and `lo < hi`.
    pub fn new(lo: f64, hi: f64) -> Result<Self, ExpanderError> {
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ExpanderError::InvalidRange { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    /// Lower bound (inclusive).
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper bound (inclusive).
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Whether `mz` lies within the closed interval.
    #[inline]
    pub fn contains(&self, mz: f64) -> bool {
        self.lo <= mz && mz <= self.hi
    }

    /// Smallest range covering both ranges.
    pub fn span(&self, other: &MzRange) -> MzRange {
        MzRange {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

impl std::fmt::Display for MzRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}-{:.4}", self.lo, self.hi)
    }
}

/// m/z tolerance; the wider of the absolute and the relative window applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzTolerance {
    /// Absolute tolerance in Da
    pub absolute: f64,
    /// Relative tolerance in parts per million
    pub ppm: f64,
}

impl MzTolerance {
    /// Create a tolerance.
    pub fn new(absolute: f64, ppm: f64) -> Self {
        Self { absolute, ppm }
    }

    /// Half-width of the window around `mz`.
    pub fn delta(&self, mz: f64) -> f64 {
        self.absolute.max(mz * self.ppm / 1e6)
    }

    /// Window around `mz`.
    pub fn range_around(&self, mz: f64) -> Result<MzRange, ExpanderError> {
        let delta = self.delta(mz);
        MzRange::new(mz - delta, mz + delta)
    }
}

/// A data point accepted by a trace, with the coordinates of its mobility scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedPoint {
    /// Mobility scan the point was read from
    pub scan: MobilityScanInfo,
    /// m/z of the point
    pub mz: f64,
    /// Intensity of the point
    pub intensity: f64,
}

/// One m/z window being expanded across the raw acquisition.
#[derive(Debug, Clone)]
pub struct CandidateTrace {
    feature_id: u64,
    mz_range: MzRange,
    rt_window: Option<RangeInclusive<f64>>,
    mobility_window: Option<RangeInclusive<f64>>,
    points: Vec<AcceptedPoint>,
}

impl CandidateTrace {
    /// Create a trace for the feature `feature_id` over `mz_range`.
    pub fn new(feature_id: u64, mz_range: MzRange) -> Self {
        Self {
            feature_id,
            mz_range,
            rt_window: None,
            mobility_window: None,
            points: Vec::new(),
        }
    }

    /// Only accept points from frames within this retention time window.
    pub fn with_rt_window(mut self, window: RangeInclusive<f64>) -> Self {
        self.rt_window = Some(window);
        self
    }

    /// Only accept points from mobility scans within this mobility window.
    pub fn with_mobility_window(mut self, window: RangeInclusive<f64>) -> Self {
        self.mobility_window = Some(window);
        self
    }

    /// Id of the feature this trace was created from.
    pub fn feature_id(&self) -> u64 {
        self.feature_id
    }

    /// The m/z window of this trace.
    pub fn mz_range(&self) -> MzRange {
        self.mz_range
    }

    /// Number of mobility scans holding an accepted point.
    pub fn num_mobility_scans(&self) -> usize {
        self.points.len()
    }

    /// Accepted points in the order they were offered.
    pub fn points(&self) -> &[AcceptedPoint] {
        &self.points
    }

    /// Move the accumulated points out of the trace.
    pub fn into_points(self) -> Vec<AcceptedPoint> {
        self.points
    }

    /// Offer the point at `point_index` of the source's current mobility scan.
    ///
    /// Rejected when the point is outside the m/z window, the scan is outside
    /// the retention time or mobility window, or the trace already holds a
    /// point for this mobility scan. Points must be offered in scan order, so
    /// only the most recent entry can share the scan.
    pub fn try_accept<S: ScanDataSource + ?Sized>(&mut self, access: &S, point_index: usize) -> bool {
        let Some(scan) = access.current_mobility_scan() else {
            return false;
        };
        let mz = access.mz_at(point_index);
        if !self.mz_range.contains(mz) || self.holds_scan(scan.key()) {
            return false;
        }
        if let Some(window) = &self.rt_window {
            if !window.contains(&scan.retention_time) {
                return false;
            }
        }
        if let Some(window) = &self.mobility_window {
            if !window.contains(&scan.mobility) {
                return false;
            }
        }

        self.points.push(AcceptedPoint {
            scan,
            mz,
            intensity: access.intensity_at(point_index),
        });
        true
    }

    fn holds_scan(&self, key: ScanKey) -> bool {
        self.points.last().is_some_and(|p| p.scan.key() == key)
    }
}

/// Contiguous storage of candidate traces, ordered by ascending lower m/z bound.
#[derive(Debug, Default)]
pub struct TraceArena {
    traces: Vec<CandidateTrace>,
}

impl TraceArena {
    /// Build an arena; traces are stably sorted by lower bound so equal
    /// bounds keep their list order.
    pub fn new(mut traces: Vec<CandidateTrace>) -> Self {
        traces.sort_by(|a, b| a.mz_range.lo.total_cmp(&b.mz_range.lo));
        Self { traces }
    }

    /// Number of traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the arena holds no traces.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Traces in sweep order.
    pub fn traces(&self) -> &[CandidateTrace] {
        &self.traces
    }

    /// Mutable traces in sweep order.
    pub fn traces_mut(&mut self) -> &mut [CandidateTrace] {
        &mut self.traces
    }

    /// m/z span covered by all traces.
    pub fn mz_span(&self) -> Option<MzRange> {
        let first = self.traces.first()?.mz_range;
        Some(self.traces.iter().fold(first, |acc, t| acc.span(&t.mz_range)))
    }

    /// Drop every trace together with its accumulator.
    pub fn clear(&mut self) {
        self.traces = Vec::new();
    }

    /// Hand the traces over for materialization.
    pub fn into_traces(self) -> Vec<CandidateTrace> {
        self.traces
    }

    /// Split into at most `parts` contiguous arenas of near-equal size.
    ///
    /// Cuts fall only where every window left of the cut ends strictly below
    /// the next window's lower bound, so no point can be contained in traces
    /// of two different parts. Runs of overlapping windows stay together, and
    /// fewer than `parts` arenas come back when such gaps are rare. Sort order
    /// is preserved within and across the parts.
    pub fn split(self, parts: usize) -> Vec<TraceArena> {
        if self.traces.is_empty() || parts == 0 {
            return vec![];
        }
        let cuts = self.gap_cuts(parts.min(self.traces.len()));

        let mut rest = self.traces;
        let mut arenas = Vec::with_capacity(cuts.len() + 1);
        for &cut in cuts.iter().rev() {
            let tail = rest.split_off(cut);
            arenas.push(TraceArena { traces: tail });
        }
        arenas.push(TraceArena { traces: rest });
        arenas.reverse();
        arenas
    }

    /// Indices where a new part may start, taking the first gap at or after
    /// each of the `parts - 1` equal-count boundaries.
    fn gap_cuts(&self, parts: usize) -> Vec<usize> {
        let total = self.traces.len();
        let mut cuts = Vec::with_capacity(parts.saturating_sub(1));
        let mut max_hi = f64::NEG_INFINITY;
        let mut next = 1;
        for (i, trace) in self.traces.iter().enumerate() {
            if next >= parts {
                break;
            }
            if i > 0 && i * parts >= next * total && max_hi < trace.mz_range.lo {
                cuts.push(i);
                while next < parts && next * total <= i * parts {
                    next += 1;
                }
            }
            max_hi = max_hi.max(trace.mz_range.hi);
        }
        cuts
    }
}
