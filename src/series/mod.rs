//! # Series Materializer
//!
//! Converts the accumulated points of an expanded trace into a dense
//! ion mobilogram time series: one mobilogram per frame, each listing the
//! trace's point for every mobility scan it was found in. Traces found in
//! fewer than two mobility scans are not features and produce nothing.

mod binning;
mod materializer;
mod summary;

use serde::{Deserialize, Serialize};

use crate::trace::AcceptedPoint;

pub use binning::{bin_mobilogram, SummedMobilogram, MAX_FILLED_BINS};
pub use materializer::{FeatureRow, SeriesMaterializer};
pub use summary::FeatureSummary;

/// Minimum number of mobility scans a trace needs to become a feature.
pub const MIN_MOBILITY_SCANS: usize = 2;

/// One frame's slice of an expanded trace, ordered by scan number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilogramSeries {
    /// Frame index
    pub frame_index: usize,
    /// Retention time of the frame in seconds
    pub retention_time: f64,
    /// Scan numbers of the entries
    pub scan_numbers: Vec<usize>,
    /// Mobility of each entry's scan
    pub mobilities: Vec<f64>,
    /// m/z of each entry
    pub mz: Vec<f64>,
    /// Intensity of each entry
    pub intensities: Vec<f64>,
}

impl MobilogramSeries {
    fn empty(frame_index: usize, retention_time: f64) -> Self {
        Self {
            frame_index,
            retention_time,
            scan_numbers: Vec::new(),
            mobilities: Vec::new(),
            mz: Vec::new(),
            intensities: Vec::new(),
        }
    }

    fn push(&mut self, point: &AcceptedPoint) {
        self.scan_numbers.push(point.scan.scan_number);
        self.mobilities.push(point.scan.mobility);
        self.mz.push(point.mz);
        self.intensities.push(point.intensity);
    }

    /// Number of mobility scans in this frame.
    pub fn len(&self) -> usize {
        self.scan_numbers.len()
    }

    /// Whether the frame holds no entries.
    pub fn is_empty(&self) -> bool {
        self.scan_numbers.is_empty()
    }

    /// Sum of all entry intensities.
    pub fn summed_intensity(&self) -> f64 {
        self.intensities.iter().sum()
    }

    /// Intensity-weighted mean m/z; the plain mean when all intensities are zero.
    pub fn weighted_mz(&self) -> f64 {
        weighted_mean(&self.mz, &self.intensities)
    }

    /// Index of the most intense entry.
    pub fn apex_index(&self) -> Option<usize> {
        self.intensities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Dense series of an expanded trace across frames and mobility scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonMobilogramTimeSeries {
    mobilograms: Vec<MobilogramSeries>,
}

impl IonMobilogramTimeSeries {
    /// Build the series from a trace's accepted points.
    ///
    /// Returns `None` when the points cover fewer than
    /// [`MIN_MOBILITY_SCANS`] mobility scans.
    pub fn from_points(mut points: Vec<AcceptedPoint>) -> Option<Self> {
        if points.len() < MIN_MOBILITY_SCANS {
            return None;
        }
        points.sort_by_key(|p| p.scan.key());

        let mut mobilograms: Vec<MobilogramSeries> = Vec::new();
        for point in &points {
            let frame_index = point.scan.frame_index;
            match mobilograms.last_mut() {
                Some(current) if current.frame_index == frame_index => current.push(point),
                _ => {
                    let mut mobilogram = MobilogramSeries::empty(frame_index, point.scan.retention_time);
                    mobilogram.push(point);
                    mobilograms.push(mobilogram);
                }
            }
        }
        Some(Self { mobilograms })
    }

    /// Per-frame mobilograms in frame order.
    pub fn mobilograms(&self) -> &[MobilogramSeries] {
        &self.mobilograms
    }

    /// Number of frames the trace was found in.
    pub fn num_frames(&self) -> usize {
        self.mobilograms.len()
    }

    /// Number of mobility scans across all frames.
    pub fn num_scans(&self) -> usize {
        self.mobilograms.iter().map(MobilogramSeries::len).sum()
    }

    /// Retention time of each frame.
    pub fn retention_times(&self) -> Vec<f64> {
        self.mobilograms.iter().map(|m| m.retention_time).collect()
    }

    /// Summed intensity of each frame.
    pub fn frame_intensities(&self) -> Vec<f64> {
        self.mobilograms
            .iter()
            .map(MobilogramSeries::summed_intensity)
            .collect()
    }

    /// Intensity-weighted m/z of each frame.
    pub fn frame_mz(&self) -> Vec<f64> {
        self.mobilograms
            .iter()
            .map(MobilogramSeries::weighted_mz)
            .collect()
    }

    /// Iterate `(mobility, mz, intensity)` over every entry.
    pub fn entries(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.mobilograms.iter().flat_map(|m| {
            m.mobilities
                .iter()
                .zip(&m.mz)
                .zip(&m.intensities)
                .map(|((&mobility, &mz), &intensity)| (mobility, mz, intensity))
        })
    }
}

pub(crate) fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
    } else if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::point;
    use super::*;

    #[test]
    fn test_too_few_scans() {
        assert!(IonMobilogramTimeSeries::from_points(vec![]).is_none());
        assert!(IonMobilogramTimeSeries::from_points(vec![point(0, 1.0, 0, 1.0, 100.0, 5.0)]).is_none());
    }

    #[test]
    fn test_groups_by_frame_in_scan_order() {
        let series = IonMobilogramTimeSeries::from_points(vec![
            point(2, 2.0, 5, 0.9, 100.02, 4.0),
            point(1, 1.0, 7, 0.8, 100.01, 1.0),
            point(1, 1.0, 3, 1.0, 100.03, 3.0),
            point(2, 2.0, 1, 1.1, 100.00, 2.0),
        ])
        .unwrap();

        assert_eq!(series.num_frames(), 2);
        assert_eq!(series.num_scans(), 4);
        assert_eq!(series.mobilograms()[0].scan_numbers, vec![3, 7]);
        assert_eq!(series.mobilograms()[1].scan_numbers, vec![1, 5]);
        assert_eq!(series.retention_times(), vec![1.0, 2.0]);
        assert_eq!(series.frame_intensities(), vec![4.0, 6.0]);

        let mz = series.frame_mz();
        assert!((mz[0] - (100.03 * 3.0 + 100.01) / 4.0).abs() < 1e-9);
        assert_eq!(series.entries().count(), 4);
    }

    #[test]
    fn test_weighted_mean_zero_weights() {
        assert_eq!(weighted_mean(&[1.0, 3.0], &[0.0, 0.0]), 2.0);
        assert_eq!(weighted_mean(&[], &[]), 0.0);
        assert_eq!(weighted_mean(&[1.0, 3.0], &[1.0, 3.0]), 2.5);
    }
}
