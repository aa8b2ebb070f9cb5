use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ims_expander::expander::InputFeature;
use ims_expander::source::{Frame, MobilityScan, PeakArrays, RawDataFile};

/// Synthetic compound: m/z, apex retention time (s), apex mobility (1/K0), height.
const COMPOUNDS: [(f64, f64, f64, f64); 6] = [
    (195.0877, 30.0, 0.92, 8.0e4),
    (301.1410, 45.0, 1.05, 2.5e5),
    (301.1460, 52.0, 1.08, 6.0e4),
    (524.2650, 60.0, 1.21, 1.2e5),
    (622.0290, 75.0, 1.34, 4.0e4),
    (922.0098, 90.0, 1.42, 3.0e5),
];

const CYCLE_TIME: f64 = 1.5;
const MOBILITY_START: f64 = 1.6;
const MOBILITY_END: f64 = 0.6;
const RT_SIGMA: f64 = 6.0;
const MOBILITY_SIGMA: f64 = 0.015;
const MIN_INTENSITY: f64 = 5.0;

/// Generate a synthetic raw file and matching feature list
pub fn run(output: PathBuf, frames: usize, scans: usize) -> Result<()> {
    info!("ims-expander demo data");
    info!("======================");

    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let raw = generate_raw_file(frames, scans);
    let features = generate_features();

    let raw_path = output.join("raw.json");
    let features_path = output.join("features.json");
    write_json(&raw_path, &raw)?;
    write_json(&features_path, &features)?;

    info!("  Frames: {}", raw.frames.len());
    info!("  Mobility scans: {}", raw.scan_count());
    info!(
        "  Centroids: {}",
        raw.frames.iter().map(Frame::peak_count).sum::<usize>()
    );
    info!("  Raw data: {}", raw_path.display());
    info!("  Features ({}): {}", features.len(), features_path.display());
    info!(
        "\nExpand with: ims-expander -v expand {} {}",
        raw_path.display(),
        features_path.display()
    );

    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn generate_raw_file(frames: usize, scans: usize) -> RawDataFile {
    let mobility_step = (MOBILITY_START - MOBILITY_END) / scans.max(1) as f64;
    let frames = (0..frames)
        .map(|frame_index| {
            let rt = frame_index as f64 * CYCLE_TIME;
            let mobility_scans = (0..scans)
                .map(|scan_number| {
                    let mobility = MOBILITY_START - scan_number as f64 * mobility_step;
                    let (peaks, raw_peaks) = generate_scan(frame_index, scan_number, rt, mobility);
                    MobilityScan::new(scan_number, mobility, peaks).with_raw_peaks(raw_peaks)
                })
                .collect();
            Frame::new(frame_index, rt, mobility_scans)
        })
        .collect();
    RawDataFile::new("demo_ims_run.d", frames)
}

/// Centroids and profile points of one mobility scan.
fn generate_scan(frame: usize, scan: usize, rt: f64, mobility: f64) -> (PeakArrays, PeakArrays) {
    let mut centroids: Vec<(f64, f64)> = Vec::new();
    for (i, &(mz, apex_rt, apex_mobility, height)) in COMPOUNDS.iter().enumerate() {
        let intensity = height
            * gaussian(rt, apex_rt, RT_SIGMA)
            * gaussian(mobility, apex_mobility, MOBILITY_SIGMA);
        if intensity >= MIN_INTENSITY {
            // a few ppm of deterministic scatter around the true m/z
            let scatter = jitter(frame, scan, i) * mz * 3e-6;
            centroids.push((mz + scatter, intensity));
        }
    }

    // chemical background at fixed m/z
    let background = 20.0 + 10.0 * jitter(frame, scan, 99).abs();
    centroids.push((150.0 + (frame % 7) as f64 * 0.5, background));
    centroids.push((733.5, background * 0.5));
    centroids.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut profile: Vec<(f64, f64)> = Vec::with_capacity(centroids.len() * 3 + 4);
    for &(mz, intensity) in &centroids {
        profile.push((mz - 0.002, intensity * 0.35));
        profile.push((mz, intensity));
        profile.push((mz + 0.002, intensity * 0.35));
    }
    for k in 0..4 {
        let mz = 100.0 + 250.0 * k as f64 + jitter(frame, scan, k).abs();
        profile.push((mz, 2.0 + jitter(frame, scan, k + 10).abs()));
    }
    profile.sort_by(|a, b| a.0.total_cmp(&b.0));

    (to_arrays(centroids), to_arrays(profile))
}

fn to_arrays(points: Vec<(f64, f64)>) -> PeakArrays {
    let (mz, intensity) = points.into_iter().unzip();
    PeakArrays::new(mz, intensity)
}

fn generate_features() -> Vec<InputFeature> {
    let mut features: Vec<InputFeature> = COMPOUNDS
        .iter()
        .enumerate()
        .map(|(i, &(mz, _, _, _))| InputFeature::new(i as u64 + 1, mz))
        .collect();

    // restrict the isobaric pair to their own elution windows
    features[1].rt_range = Some((COMPOUNDS[1].1 - 15.0, COMPOUNDS[1].1 + 5.0));
    features[2].rt_range = Some((COMPOUNDS[2].1 - 2.0, COMPOUNDS[2].1 + 15.0));
    // no signal at this m/z
    features.push(InputFeature::new(COMPOUNDS.len() as u64 + 1, 412.9876));
    features
}

fn gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (-0.5 * z * z).exp()
}

/// Deterministic value in [-1, 1).
fn jitter(frame: usize, scan: usize, salt: usize) -> f64 {
    let mut h = (frame as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (scan as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ (salt as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    (h >> 11) as f64 / (1u64 << 52) as f64 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_raw_file_is_valid() {
        let raw = generate_raw_file(10, 20);
        assert_eq!(raw.frames.len(), 10);
        assert_eq!(raw.scan_count(), 200);
        raw.validate().unwrap();
    }

    #[test]
    fn test_jitter_range() {
        for i in 0..1000 {
            let j = jitter(i, i * 3, i % 7);
            assert!((-1.0..1.0).contains(&j));
        }
    }

    #[test]
    fn test_demo_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path().to_path_buf(), 4, 5).unwrap();
        let raw = RawDataFile::from_json_file(dir.path().join("raw.json")).unwrap();
        assert_eq!(raw.frames.len(), 4);
        let features = InputFeature::from_json_file(dir.path().join("features.json")).unwrap();
        assert_eq!(features.len(), COMPOUNDS.len() + 1);
    }
}
