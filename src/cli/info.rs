use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use ims_expander::source::{Frame, RawDataFile};

/// Display information about a raw data file or an exported Parquet file
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    if file.extension().is_some_and(|ext| ext == "parquet") {
        return parquet_info(&file);
    }

    let raw = RawDataFile::from_json_file(&file)
        .with_context(|| format!("Failed to read raw data file {}", file.display()))?;
    print!("{}", RawFileSummary::from_raw(&raw).render(&file));
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct RawFileSummary {
    name: String,
    frames: usize,
    scans: usize,
    centroids: usize,
    raw_points: usize,
    scans_without_raw: usize,
    rt_range: Option<(f64, f64)>,
    mobility_range: Option<(f64, f64)>,
    mz_range: Option<(f64, f64)>,
}

fn widen(range: &mut Option<(f64, f64)>, lo: f64, hi: f64) {
    *range = Some(match *range {
        Some((a, b)) => (a.min(lo), b.max(hi)),
        None => (lo, hi),
    });
}

impl RawFileSummary {
    fn from_raw(raw: &RawDataFile) -> Self {
        let mut summary = Self {
            name: raw.name.clone(),
            frames: raw.frames.len(),
            scans: raw.scan_count(),
            centroids: raw.frames.iter().map(Frame::peak_count).sum(),
            ..Default::default()
        };
        for frame in &raw.frames {
            widen(&mut summary.rt_range, frame.retention_time, frame.retention_time);
            for scan in &frame.mobility_scans {
                widen(&mut summary.mobility_range, scan.mobility, scan.mobility);
                if let (Some(&lo), Some(&hi)) = (scan.peaks.mz.first(), scan.peaks.mz.last()) {
                    widen(&mut summary.mz_range, lo, hi);
                }
                match &scan.raw_peaks {
                    Some(raw_peaks) => summary.raw_points += raw_peaks.len(),
                    None => summary.scans_without_raw += 1,
                }
            }
        }
        summary
    }

    fn render(&self, path: &Path) -> String {
        let range = |r: Option<(f64, f64)>, precision: usize| match r {
            Some((lo, hi)) => format!("{lo:.precision$} - {hi:.precision$}"),
            None => "-".to_string(),
        };
        let mut out = String::new();
        out.push_str("Raw Data File Information\n");
        out.push_str("=========================\n");
        out.push_str(&format!("File: {}\n", path.display()));
        out.push_str(&format!("Name: {}\n\n", self.name));
        out.push_str(&format!("  Frames: {}\n", self.frames));
        out.push_str(&format!("  Mobility scans: {}\n", self.scans));
        out.push_str(&format!("  Centroids: {}\n", self.centroids));
        out.push_str(&format!("  Raw points: {}\n", self.raw_points));
        if self.scans_without_raw > 0 {
            out.push_str(&format!(
                "  Scans without raw data: {} (raw mode unavailable)\n",
                self.scans_without_raw
            ));
        }
        out.push_str(&format!("  Retention time (s): {}\n", range(self.rt_range, 2)));
        out.push_str(&format!("  Mobility: {}\n", range(self.mobility_range, 4)));
        out.push_str(&format!("  m/z: {}\n", range(self.mz_range, 4)));
        out
    }
}

#[cfg(feature = "parquet-export")]
fn parquet_info(file: &Path) -> Result<()> {
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use std::fs::File;

    let file_handle = File::open(file).context("Failed to open file")?;
    let reader = SerializedFileReader::new(file_handle).context("Failed to read Parquet file")?;

    let metadata = reader.metadata();
    let file_metadata = metadata.file_metadata();

    println!("Expanded Feature File Information");
    println!("=================================");
    println!("File: {}", file.display());
    println!();

    println!("File Statistics:");
    println!("  Row groups: {}", metadata.num_row_groups());
    println!("  Features: {}", file_metadata.num_rows());
    println!(
        "  Schema columns: {}",
        file_metadata.schema_descr().num_columns()
    );
    println!();

    if let Some(kv_metadata) = file_metadata.key_value_metadata() {
        println!("Metadata Keys:");
        for kv in kv_metadata {
            let value_preview = kv
                .value
                .as_ref()
                .map(|v| {
                    if v.len() > 100 {
                        format!("{}... ({} bytes)", &v[..100], v.len())
                    } else {
                        v.clone()
                    }
                })
                .unwrap_or_else(|| "<null>".to_string());
            println!("  {}: {}", kv.key, value_preview);
        }
        println!();
    }

    println!("Schema:");
    for i in 0..file_metadata.schema_descr().num_columns() {
        let col = file_metadata.schema_descr().column(i);
        println!("  {:3}. {} ({})", i + 1, col.path(), col.physical_type());
    }

    Ok(())
}

#[cfg(not(feature = "parquet-export"))]
fn parquet_info(_file: &Path) -> Result<()> {
    anyhow::bail!("Parquet support requires the parquet-export feature")
}
