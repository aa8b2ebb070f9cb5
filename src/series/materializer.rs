use serde::{Deserialize, Serialize};

use crate::job::{CancellationToken, Cancelled};
use crate::source::RawDataFileRef;
use crate::trace::CandidateTrace;

use super::{bin_mobilogram, FeatureSummary, IonMobilogramTimeSeries, SummedMobilogram};

/// One expanded feature, ready to be appended to an output feature list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Id of the input feature the trace was built from
    pub feature_id: u64,
    /// Raw data file the series was read from
    pub raw_file: RawDataFileRef,
    /// Summary values recomputed from the series
    pub summary: FeatureSummary,
    /// Mobilogram summed over all frames
    pub mobilogram: SummedMobilogram,
    /// Dense per-frame series
    pub series: IonMobilogramTimeSeries,
}

/// Turns expanded traces into [`FeatureRow`]s.
#[derive(Debug, Clone)]
pub struct SeriesMaterializer {
    raw_file: RawDataFileRef,
    mobility_bin_width: Option<f64>,
}

impl SeriesMaterializer {
    /// Create a materializer tagging rows with `raw_file`.
    pub fn new(raw_file: RawDataFileRef, mobility_bin_width: Option<f64>) -> Self {
        Self {
            raw_file,
            mobility_bin_width,
        }
    }

    /// Consume one trace. Returns `None` if it was found in fewer than two
    /// mobility scans.
    pub fn materialize(&self, trace: CandidateTrace) -> Option<FeatureRow> {
        let feature_id = trace.feature_id();
        let series = IonMobilogramTimeSeries::from_points(trace.into_points())?;
        let summary = FeatureSummary::from_series(&series);
        let mobilogram = bin_mobilogram(&series, self.mobility_bin_width);

        Some(FeatureRow {
            feature_id,
            raw_file: self.raw_file.clone(),
            summary,
            mobilogram,
            series,
        })
    }

    /// Consume all traces in order, calling `on_trace(done, total)` after each.
    ///
    /// Cancellation is checked after every trace; on cancellation the rows
    /// built so far are dropped.
    pub fn materialize_all<F>(
        &self,
        traces: Vec<CandidateTrace>,
        cancel: &CancellationToken,
        mut on_trace: F,
    ) -> Result<Vec<FeatureRow>, Cancelled>
    where
        F: FnMut(usize, usize),
    {
        let total = traces.len();
        let mut rows = Vec::with_capacity(total);
        for (i, trace) in traces.into_iter().enumerate() {
            if let Some(row) = self.materialize(trace) {
                rows.push(row);
            }
            on_trace(i + 1, total);
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
        }
        Ok(rows)
    }
}
