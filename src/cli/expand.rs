use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ims_expander::config::{Config, ExpanderConfig};
use ims_expander::expander::{ExpansionReport, ImsExpander, InputFeature, TaskHandles};
use ims_expander::job::{CancellationToken, FeatureList, FeatureListCollector, JobStatus};
use ims_expander::series::FeatureRow;
use ims_expander::source::RawDataFile;

use super::ExpandOverrides;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// JSON document written by the expand command.
#[derive(Serialize)]
struct ExpandedFeatureList<'a> {
    id: uuid::Uuid,
    name: &'a str,
    created: String,
    settings: &'a ExpanderConfig,
    report: &'a ExpansionReport,
    features: &'a [FeatureRow],
}

/// Expand a feature list against a raw data file
pub fn run(
    raw: PathBuf,
    features: PathBuf,
    output: Option<PathBuf>,
    parquet: Option<PathBuf>,
    config_path: Option<PathBuf>,
    overrides: ExpandOverrides,
) -> Result<()> {
    if !raw.exists() {
        anyhow::bail!("Raw data file does not exist: {}", raw.display());
    }
    if !features.exists() {
        anyhow::bail!("Feature file does not exist: {}", features.display());
    }

    let mut settings = match &config_path {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            Config::from_file(path)?.expander
        }
        None => ExpanderConfig::default(),
    };
    apply_overrides(&mut settings, &overrides);

    let output = output.unwrap_or_else(|| default_output(&raw));

    info!("Input:    {}", raw.display());
    info!("Features: {}", features.display());
    info!("Output:   {}", output.display());
    let noise = settings
        .effective_noise_level()
        .map_or_else(|| "off".to_string(), |n| n.to_string());
    info!(
        "Mode: {:?}, noise level: {}, tolerance: {} Da / {} ppm, jobs: {}",
        settings.data_mode(),
        noise,
        settings.mz_tolerance,
        settings.mz_tolerance_ppm,
        settings.num_jobs
    );

    let raw_file = RawDataFile::from_json_file(&raw)
        .with_context(|| format!("Failed to load raw data file {}", raw.display()))?;
    let input_features = InputFeature::from_json_file(&features)
        .with_context(|| format!("Failed to load features {}", features.display()))?;
    info!(
        "Loaded {} frames ({} mobility scans) and {} features",
        raw_file.frames.len(),
        raw_file.scan_count(),
        input_features.len()
    );

    let expander = ImsExpander::new(settings.clone()).context("Invalid expansion settings")?;
    let name = format!("{} expanded", raw_file.name);
    let list = Arc::new(FeatureList::new(name.clone()));
    let collector = FeatureListCollector::spawn(Arc::clone(&list), settings.num_jobs)?;

    let task = expander.prepare(&name, &raw_file, &input_features, &CancellationToken::new())?;
    let handles = task.handles();
    let sender = collector.sender()?;

    let done = AtomicBool::new(false);
    let report = std::thread::scope(|s| {
        s.spawn(|| report_progress(&handles, &done));
        let report = task.run(&sender);
        done.store(true, Ordering::Release);
        report
    });
    drop(sender);
    let list = collector.finish()?;

    for message in report.errors() {
        warn!("{message}");
    }
    if report.status() == JobStatus::Error {
        anyhow::bail!("Expansion failed: {}", report.errors().join("; "));
    }

    let rows = list.rows();
    info!(
        "Expanded {} of {} features in {:.2}s",
        rows.len(),
        report.num_traces,
        report.elapsed_seconds
    );

    write_json(&output, &list, &settings, &report, &rows)?;

    if let Some(path) = parquet {
        write_parquet(&path, &settings, &rows)?;
    }

    Ok(())
}

fn apply_overrides(settings: &mut ExpanderConfig, overrides: &ExpandOverrides) {
    if overrides.raw_data {
        settings.use_raw_data = true;
    }
    if let Some(noise_level) = overrides.noise_level {
        settings.noise_level = noise_level;
    }
    if let Some(tolerance) = overrides.mz_tolerance {
        settings.mz_tolerance = tolerance;
    }
    if let Some(ppm) = overrides.ppm {
        settings.mz_tolerance_ppm = ppm;
    }
    if overrides.bin_width.is_some() {
        settings.mobility_bin_width = overrides.bin_width;
    }
    if let Some(jobs) = overrides.jobs {
        settings.num_jobs = jobs;
    }
}

fn default_output(raw: &Path) -> PathBuf {
    let stem = raw.file_stem().unwrap_or_default().to_string_lossy();
    raw.with_file_name(format!("{stem}.expanded.json"))
}

fn report_progress(handles: &TaskHandles, done: &AtomicBool) {
    while !done.load(Ordering::Acquire) && !handles.all_terminal() {
        std::thread::sleep(PROGRESS_INTERVAL);
        info!("Progress: {:.1}%", handles.progress() * 100.0);
    }
}

fn write_json(
    output: &Path,
    list: &FeatureList,
    settings: &ExpanderConfig,
    report: &ExpansionReport,
    rows: &[FeatureRow],
) -> Result<()> {
    let document = ExpandedFeatureList {
        id: list.id(),
        name: list.name(),
        created: chrono::Utc::now().to_rfc3339(),
        settings,
        report,
        features: rows,
    };
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &document)
        .context("Failed to write feature list")?;
    info!("Wrote {} features to {}", rows.len(), output.display());
    Ok(())
}

#[cfg(feature = "parquet-export")]
fn write_parquet(path: &Path, settings: &ExpanderConfig, rows: &[FeatureRow]) -> Result<()> {
    use ims_expander::mobilogram_writer::{MobilogramWriter, MobilogramWriterConfig};

    let mut writer = MobilogramWriter::new_file(path, settings, MobilogramWriterConfig::default())
        .context("Failed to create Parquet writer")?;
    writer
        .write_features(rows)
        .context("Failed to write features")?;
    let stats = writer.finish().context("Failed to finalize Parquet file")?;
    info!("{} to {}", stats, path.display());
    Ok(())
}

#[cfg(not(feature = "parquet-export"))]
fn write_parquet(_path: &Path, _settings: &ExpanderConfig, _rows: &[FeatureRow]) -> Result<()> {
    anyhow::bail!("Parquet export requested but binary was built without parquet-export")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let mut settings = ExpanderConfig {
            noise_level: 10.0,
            num_jobs: 4,
            ..Default::default()
        };
        let overrides = ExpandOverrides {
            raw_data: true,
            ppm: Some(5.0),
            bin_width: Some(0.01),
            ..Default::default()
        };
        apply_overrides(&mut settings, &overrides);

        assert!(settings.use_raw_data);
        assert_eq!(settings.noise_level, 10.0);
        assert_eq!(settings.mz_tolerance_ppm, 5.0);
        assert_eq!(settings.mobility_bin_width, Some(0.01));
        assert_eq!(settings.num_jobs, 4);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output(Path::new("data/run01.json")),
            PathBuf::from("data/run01.expanded.json")
        );
    }

    #[test]
    fn test_expand_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        super::super::demo::run(dir.path().to_path_buf(), 40, 50).unwrap();
        let output = dir.path().join("out.json");

        run(
            dir.path().join("raw.json"),
            dir.path().join("features.json"),
            Some(output.clone()),
            None,
            None,
            ExpandOverrides {
                jobs: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        let document: serde_json::Value =
            serde_json::from_reader(File::open(&output).unwrap()).unwrap();
        assert!(!document["features"].as_array().unwrap().is_empty());
        assert_eq!(document["settings"]["num_jobs"], 2);
    }
}
