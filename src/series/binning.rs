use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::IonMobilogramTimeSeries;

/// Most bins a width-binned mobilogram fills between its first and last
/// occupied bin; wider spans keep only the occupied bins.
pub const MAX_FILLED_BINS: i64 = 10_000;

// 2^53, the largest bin index an f64 holds exactly
const MAX_BIN_INDEX: f64 = 9_007_199_254_740_992.0;

/// Intensity summed over all frames of a series, resolved by mobility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummedMobilogram {
    /// Mobility of each bin (bin centre, or scan mobility when unbinned)
    pub mobilities: Vec<f64>,
    /// Summed intensity of each bin
    pub intensities: Vec<f64>,
}

impl SummedMobilogram {
    /// Number of bins.
    pub fn len(&self) -> usize {
        self.mobilities.len()
    }

    /// Whether there are no bins.
    pub fn is_empty(&self) -> bool {
        self.mobilities.is_empty()
    }
}

/// Sum a series over its frames.
///
/// With a `bin_width`, entries fall into bins on a global grid of that width
/// and empty bins between the first and last occupied one are kept as zeros,
/// up to [`MAX_FILLED_BINS`]. Without one, or when the grid index of an entry
/// is not representable, entries are summed per mobility scan number.
pub fn bin_mobilogram(series: &IonMobilogramTimeSeries, bin_width: Option<f64>) -> SummedMobilogram {
    match bin_width {
        Some(width) if width > 0.0 => {
            bin_by_width(series, width).unwrap_or_else(|| bin_by_scan(series))
        }
        _ => bin_by_scan(series),
    }
}

fn bin_by_scan(series: &IonMobilogramTimeSeries) -> SummedMobilogram {
    // scan number -> (mobility, intensity)
    let mut scans: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
    for mobilogram in series.mobilograms() {
        for ((&scan, &mobility), &intensity) in mobilogram
            .scan_numbers
            .iter()
            .zip(&mobilogram.mobilities)
            .zip(&mobilogram.intensities)
        {
            let entry = scans.entry(scan).or_insert((mobility, 0.0));
            entry.1 += intensity;
        }
    }

    let (mobilities, intensities) = scans.into_values().unzip();
    SummedMobilogram {
        mobilities,
        intensities,
    }
}

fn bin_by_width(series: &IonMobilogramTimeSeries, width: f64) -> Option<SummedMobilogram> {
    let mut bins: BTreeMap<i64, f64> = BTreeMap::new();
    for (mobility, _, intensity) in series.entries() {
        let bin = (mobility / width).floor();
        if !(bin.abs() <= MAX_BIN_INDEX) {
            return None;
        }
        *bins.entry(bin as i64).or_insert(0.0) += intensity;
    }

    let (Some(&first), Some(&last)) = (bins.keys().next(), bins.keys().next_back()) else {
        return Some(SummedMobilogram::default());
    };

    let centre = |bin: i64| (bin as f64 + 0.5) * width;
    let mut summed = SummedMobilogram::default();
    if last - first >= MAX_FILLED_BINS {
        for (bin, intensity) in bins {
            summed.mobilities.push(centre(bin));
            summed.intensities.push(intensity);
        }
    } else {
        for bin in first..=last {
            summed.mobilities.push(centre(bin));
            summed.intensities.push(bins.get(&bin).copied().unwrap_or(0.0));
        }
    }
    Some(summed)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::point;
    use super::*;

    fn series() -> IonMobilogramTimeSeries {
        IonMobilogramTimeSeries::from_points(vec![
            point(1, 1.0, 10, 1.0005, 300.0, 5.0),
            point(1, 1.0, 12, 1.0065, 300.0, 7.0),
            point(2, 2.0, 10, 1.0005, 300.0, 1.0),
            point(2, 2.0, 11, 1.0035, 300.0, 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_bin_by_scan_number() {
        let summed = bin_mobilogram(&series(), None);
        assert_eq!(summed.mobilities, vec![1.0005, 1.0035, 1.0065]);
        assert_eq!(summed.intensities, vec![6.0, 2.0, 7.0]);
    }

    #[test]
    fn test_bin_by_width_fills_gaps() {
        let summed = bin_mobilogram(&series(), Some(0.002));
        // bins 500, 501, 502, 503 on the 0.002 grid
        assert_eq!(summed.len(), 4);
        assert_eq!(summed.intensities, vec![6.0, 2.0, 0.0, 7.0]);
        assert!((summed.mobilities[0] - 1.001).abs() < 1e-9);
        assert!((summed.mobilities[3] - 1.007).abs() < 1e-9);
    }

    #[test]
    fn test_tiny_width_keeps_only_occupied_bins() {
        let series = IonMobilogramTimeSeries::from_points(vec![
            point(1, 1.0, 10, 0.6, 300.0, 5.0),
            point(1, 1.0, 90, 1.6, 300.0, 7.0),
        ])
        .unwrap();
        let summed = bin_mobilogram(&series, Some(1e-7));
        assert_eq!(summed.len(), 2);
        assert_eq!(summed.intensities, vec![5.0, 7.0]);
        assert!((summed.mobilities[0] - 0.6).abs() < 1e-6);
        assert!((summed.mobilities[1] - 1.6).abs() < 1e-6);
    }

    #[test]
    fn test_unrepresentable_grid_falls_back_to_scans() {
        let summed = bin_mobilogram(&series(), Some(f64::MIN_POSITIVE));
        assert_eq!(summed, bin_mobilogram(&series(), None));
    }
}
