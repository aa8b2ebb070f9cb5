use serde::{Deserialize, Serialize};

use super::{weighted_mean, IonMobilogramTimeSeries};

/// Summary values of a feature, derived from its series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Intensity-weighted m/z over all entries
    pub mz: f64,
    /// Retention time of the most intense frame
    pub retention_time: f64,
    /// Mobility of the most intense entry in the most intense frame
    pub mobility: f64,
    /// Highest summed frame intensity
    pub height: f64,
    /// Trapezoidal area of summed frame intensity over retention time
    pub area: f64,
    /// Lowest and highest retention time
    pub rt_range: (f64, f64),
    /// Lowest and highest entry m/z
    pub mz_range: (f64, f64),
    /// Lowest and highest entry mobility
    pub mobility_range: (f64, f64),
    /// Number of frames
    pub num_frames: usize,
    /// Number of mobility scans
    pub num_scans: usize,
}

impl FeatureSummary {
    /// Compute the summary of a non-empty series.
    pub fn from_series(series: &IonMobilogramTimeSeries) -> Self {
        let rts = series.retention_times();
        let frame_intensities = series.frame_intensities();

        let apex_frame = frame_intensities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (retention_time, mobility) = series
            .mobilograms()
            .get(apex_frame)
            .and_then(|m| m.apex_index().map(|i| (m.retention_time, m.mobilities[i])))
            .unwrap_or((f64::NAN, f64::NAN));

        let (mut mzs, mut intensities) = (Vec::new(), Vec::new());
        let mut mz_range = (f64::INFINITY, f64::NEG_INFINITY);
        let mut mobility_range = (f64::INFINITY, f64::NEG_INFINITY);
        for (entry_mobility, mz, intensity) in series.entries() {
            mzs.push(mz);
            intensities.push(intensity);
            mz_range = (mz_range.0.min(mz), mz_range.1.max(mz));
            mobility_range = (
                mobility_range.0.min(entry_mobility),
                mobility_range.1.max(entry_mobility),
            );
        }

        let rt_range = rts
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &rt| {
                (lo.min(rt), hi.max(rt))
            });

        Self {
            mz: weighted_mean(&mzs, &intensities),
            retention_time,
            mobility,
            height: frame_intensities.get(apex_frame).copied().unwrap_or(0.0),
            area: trapezoid_area(&rts, &frame_intensities),
            rt_range,
            mz_range,
            mobility_range,
            num_frames: series.num_frames(),
            num_scans: series.num_scans(),
        }
    }
}

/// Area under `(x, y)` by the trapezoidal rule; zero for fewer than two points.
pub(crate) fn trapezoid_area(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}
