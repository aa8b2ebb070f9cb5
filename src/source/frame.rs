//! In-memory frame model for ion mobility acquisitions.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SourceError;

/// Parallel m/z and intensity arrays of one mobility scan, sorted by m/z.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakArrays {
    /// Mass-to-charge ratios, ascending
    pub mz: Vec<f64>,
    /// Intensities, one per m/z value
    pub intensity: Vec<f64>,
}

impl PeakArrays {
    /// Create a new peak array set.
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self { mz, intensity }
    }

    /// Returns the number of points.
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    /// Returns true if there are no points.
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Validate that the arrays have matching lengths and that m/z values
    /// are finite and ascending.
    pub fn validate(&self) -> Result<(), String> {
        if self.intensity.len() != self.mz.len() {
            return Err(format!(
                "intensity length {} does not match mz length {}",
                self.intensity.len(),
                self.mz.len()
            ));
        }
        if let Some(bad) = self.mz.iter().position(|mz| !mz.is_finite()) {
            return Err(format!("non-finite m/z value at index {bad}"));
        }
        if let Some(pos) = self.mz.windows(2).position(|w| w[1] < w[0]) {
            return Err(format!(
                "m/z values are not ascending at index {} ({} > {})",
                pos + 1,
                self.mz[pos],
                self.mz[pos + 1]
            ));
        }
        Ok(())
    }
}

/// One ion mobility resolved slice within a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityScan {
    /// Scan number within the frame
    pub scan_number: usize,
    /// Ion mobility of this scan (1/K0 or drift time)
    pub mobility: f64,
    /// Centroided peak list
    pub peaks: PeakArrays,
    /// Raw (profile) data points; absent when only centroids were kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_peaks: Option<PeakArrays>,
}

impl MobilityScan {
    /// Create a mobility scan carrying only centroided peaks.
    pub fn new(scan_number: usize, mobility: f64, peaks: PeakArrays) -> Self {
        Self {
            scan_number,
            mobility,
            peaks,
            raw_peaks: None,
        }
    }

    /// Attach raw data points to this scan.
    pub fn with_raw_peaks(mut self, raw_peaks: PeakArrays) -> Self {
        self.raw_peaks = Some(raw_peaks);
        self
    }
}

/// One acquisition cycle: a retention time and its ordered mobility scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame index (native ID from the vendor file)
    pub frame_index: usize,
    /// Retention time in seconds
    pub retention_time: f64,
    /// Mobility scans in acquisition order
    pub mobility_scans: Vec<MobilityScan>,
}

impl Frame {
    /// Create a new frame.
    pub fn new(frame_index: usize, retention_time: f64, mobility_scans: Vec<MobilityScan>) -> Self {
        Self {
            frame_index,
            retention_time,
            mobility_scans,
        }
    }

    /// Number of mobility scans in this frame.
    pub fn scan_count(&self) -> usize {
        self.mobility_scans.len()
    }

    /// Total number of centroided points in this frame.
    pub fn peak_count(&self) -> usize {
        self.mobility_scans.iter().map(|s| s.peaks.len()).sum()
    }
}

/// Reference to the raw data file a result was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawDataFileRef {
    /// File name as shown to the user
    pub name: String,
}

impl RawDataFileRef {
    /// Create a reference by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for RawDataFileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A resident ion mobility acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataFile {
    /// File name
    pub name: String,
    /// Frames, ordered by retention time
    pub frames: Vec<Frame>,
}

impl RawDataFile {
    /// Create a raw data file from already loaded frames.
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }

    /// Load and validate a raw data file from its JSON representation.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        let raw: Self = serde_json::from_reader(BufReader::new(file))?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reference used to tag result rows.
    pub fn file_ref(&self) -> RawDataFileRef {
        RawDataFileRef::new(self.name.clone())
    }

    /// Total number of mobility scans across all frames.
    pub fn scan_count(&self) -> usize {
        self.frames.iter().map(Frame::scan_count).sum()
    }

    /// Check the point-array contract of every scan.
    pub fn validate(&self) -> Result<(), SourceError> {
        for frame in &self.frames {
            for scan in &frame.mobility_scans {
                let check = |arrays: &PeakArrays, kind: &str| {
                    arrays.validate().map_err(|msg| {
                        SourceError::InvalidData(format!(
                            "frame {}, scan {} ({kind}): {msg}",
                            frame.frame_index, scan.scan_number
                        ))
                    })
                };
                check(&scan.peaks, "centroid")?;
                if let Some(raw) = &scan.raw_peaks {
                    check(raw, "raw")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_arrays_validate() {
        assert!(PeakArrays::new(vec![100.0, 200.0], vec![1.0, 2.0]).validate().is_ok());
        assert!(PeakArrays::new(vec![100.0, 200.0], vec![1.0]).validate().is_err());
        assert!(PeakArrays::new(vec![200.0, 100.0], vec![1.0, 2.0]).validate().is_err());
        assert!(PeakArrays::new(vec![f64::NAN], vec![1.0]).validate().is_err());
    }

    #[test]
    fn test_raw_data_file_json() {
        let json = r#"{
            "name": "run01.d",
            "frames": [
                {
                    "frame_index": 1,
                    "retention_time": 12.5,
                    "mobility_scans": [
                        {
                            "scan_number": 0,
                            "mobility": 1.2,
                            "peaks": { "mz": [100.0, 101.0], "intensity": [10.0, 20.0] }
                        }
                    ]
                }
            ]
        }"#;

        let raw: RawDataFile = serde_json::from_str(json).unwrap();
        assert!(raw.validate().is_ok());
        assert_eq!(raw.scan_count(), 1);
        assert_eq!(raw.frames[0].peak_count(), 2);
        assert!(raw.frames[0].mobility_scans[0].raw_peaks.is_none());
        assert_eq!(raw.file_ref().to_string(), "run01.d");
    }

    #[test]
    fn test_validate_reports_location() {
        let scan = MobilityScan::new(7, 1.0, PeakArrays::new(vec![2.0, 1.0], vec![1.0, 1.0]));
        let raw = RawDataFile::new("bad", vec![Frame::new(3, 1.0, vec![scan])]);
        let err = raw.validate().unwrap_err();
        assert!(err.to_string().contains("frame 3, scan 7"));
    }
}
