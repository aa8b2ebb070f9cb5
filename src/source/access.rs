//! Sequential frame / mobility scan access used by the sweep.

use super::error::SourceError;
use super::frame::{Frame, MobilityScan, PeakArrays};

/// Which point list of a mobility scan is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Raw (profile) data points, subject to the noise floor
    Raw,
    /// Centroided peak list
    #[default]
    Centroid,
}

/// Position and coordinates of the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frame index
    pub frame_index: usize,
    /// Retention time in seconds
    pub retention_time: f64,
    /// Number of mobility scans in the frame
    pub scan_count: usize,
}

/// Sort key of a mobility scan across the whole acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanKey {
    /// Frame index
    pub frame_index: usize,
    /// Scan number within the frame
    pub scan_number: usize,
}

/// Coordinates of the current mobility scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobilityScanInfo {
    /// Frame index
    pub frame_index: usize,
    /// Retention time of the owning frame in seconds
    pub retention_time: f64,
    /// Scan number within the frame
    pub scan_number: usize,
    /// Ion mobility of the scan
    pub mobility: f64,
}

impl MobilityScanInfo {
    /// Key identifying this scan within the acquisition.
    pub fn key(&self) -> ScanKey {
        ScanKey {
            frame_index: self.frame_index,
            scan_number: self.scan_number,
        }
    }
}

/// Ordered access to frames, their mobility scans, and the m/z-ascending
/// point arrays of the current scan.
///
/// Mode and noise floor are fixed when the source is built. Implementations
/// guarantee that `mz_at` is non-decreasing in the point index; consumers
/// rely on that and do not re-check it.
pub trait ScanDataSource {
    /// Number of frames this source will yield.
    fn frame_count(&self) -> usize;

    /// Advance to the next frame. Fails with [`SourceError::EndOfData`] when
    /// all frames are consumed.
    fn next_frame(&mut self) -> Result<FrameInfo, SourceError>;

    /// Whether the current frame has more mobility scans.
    fn has_next_mobility_scan(&self) -> bool;

    /// Advance to the next mobility scan of the current frame.
    fn next_mobility_scan(&mut self) -> Result<MobilityScanInfo, SourceError>;

    /// The mobility scan the point accessors refer to.
    fn current_mobility_scan(&self) -> Option<MobilityScanInfo>;

    /// Number of points in the current mobility scan.
    fn point_count(&self) -> usize;

    /// m/z of the point at `index` in the current mobility scan.
    fn mz_at(&self, index: usize) -> f64;

    /// Intensity of the point at `index` in the current mobility scan.
    fn intensity_at(&self, index: usize) -> f64;

    /// Exposed data mode.
    fn mode(&self) -> DataMode;

    /// Noise floor applied to exposed points; only set in raw mode.
    fn noise_level(&self) -> Option<f64>;
}

/// [`ScanDataSource`] over a resident slice of frames.
pub struct MobilityScanDataAccess<'a> {
    frames: &'a [Frame],
    mode: DataMode,
    noise_level: Option<f64>,
    next_frame_index: usize,
    current_frame: Option<&'a Frame>,
    next_scan_index: usize,
    current_scan: Option<MobilityScanInfo>,
    current_points: Option<&'a PeakArrays>,
}

impl<'a> MobilityScanDataAccess<'a> {
    /// Create an access over `frames`. The noise floor is only kept in raw
    /// mode; centroided peak lists are never filtered.
    pub fn new(frames: &'a [Frame], mode: DataMode, noise_level: f64) -> Self {
        let noise_level = match mode {
            DataMode::Raw => Some(noise_level),
            DataMode::Centroid => None,
        };
        Self {
            frames,
            mode,
            noise_level,
            next_frame_index: 0,
            current_frame: None,
            next_scan_index: 0,
            current_scan: None,
            current_points: None,
        }
    }

    fn points_of(&self, frame: &Frame, scan: &'a MobilityScan) -> Result<&'a PeakArrays, SourceError> {
        match self.mode {
            DataMode::Centroid => Ok(&scan.peaks),
            DataMode::Raw => scan
                .raw_peaks
                .as_ref()
                .ok_or(SourceError::MissingPeakList {
                    frame_index: frame.frame_index,
                    scan_number: scan.scan_number,
                }),
        }
    }
}

impl<'a> ScanDataSource for MobilityScanDataAccess<'a> {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn next_frame(&mut self) -> Result<FrameInfo, SourceError> {
        let frame = self
            .frames
            .get(self.next_frame_index)
            .ok_or(SourceError::EndOfData)?;
        self.next_frame_index += 1;
        self.current_frame = Some(frame);
        self.next_scan_index = 0;
        self.current_scan = None;
        self.current_points = None;

        Ok(FrameInfo {
            frame_index: frame.frame_index,
            retention_time: frame.retention_time,
            scan_count: frame.scan_count(),
        })
    }

    fn has_next_mobility_scan(&self) -> bool {
        self.current_frame
            .map(|frame| self.next_scan_index < frame.mobility_scans.len())
            .unwrap_or(false)
    }

    fn next_mobility_scan(&mut self) -> Result<MobilityScanInfo, SourceError> {
        let frame = self.current_frame.ok_or(SourceError::NoMobilityScan)?;
        let scan = frame
            .mobility_scans
            .get(self.next_scan_index)
            .ok_or(SourceError::NoMobilityScan)?;
        self.next_scan_index += 1;

        // Clear first so a failed lookup never leaves the previous scan's points exposed.
        self.current_scan = None;
        self.current_points = None;
        let points = self.points_of(frame, scan)?;

        let info = MobilityScanInfo {
            frame_index: frame.frame_index,
            retention_time: frame.retention_time,
            scan_number: scan.scan_number,
            mobility: scan.mobility,
        };
        self.current_scan = Some(info);
        self.current_points = Some(points);
        Ok(info)
    }

    fn current_mobility_scan(&self) -> Option<MobilityScanInfo> {
        self.current_scan
    }

    fn point_count(&self) -> usize {
        // arrays of unequal length expose only their common prefix
        self.current_points
            .map(|p| p.mz.len().min(p.intensity.len()))
            .unwrap_or(0)
    }

    fn mz_at(&self, index: usize) -> f64 {
        self.current_points
            .and_then(|p| p.mz.get(index).copied())
            .unwrap_or(f64::NAN)
    }

    fn intensity_at(&self, index: usize) -> f64 {
        self.current_points
            .and_then(|p| p.intensity.get(index).copied())
            .unwrap_or(f64::NAN)
    }

    fn mode(&self) -> DataMode {
        self.mode
    }

    fn noise_level(&self) -> Option<f64> {
        self.noise_level
    }
}
