use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod demo;
mod expand;
mod info;

/// ims-expander - Re-expand ion mobility features against raw data
#[derive(Parser)]
#[command(name = "ims-expander")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ExpandOverrides {
    /// Sweep raw profile points instead of centroided peaks
    #[arg(long)]
    pub raw_data: bool,

    /// Noise floor for raw points (raw mode only)
    #[arg(short = 'n', long)]
    pub noise_level: Option<f64>,

    /// Absolute m/z tolerance in Da
    #[arg(long)]
    pub mz_tolerance: Option<f64>,

    /// Relative m/z tolerance in ppm
    #[arg(long)]
    pub ppm: Option<f64>,

    /// Mobility bin width of the summed mobilogram (per scan when omitted)
    #[arg(long)]
    pub bin_width: Option<f64>,

    /// Maximum number of parallel expansion jobs
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a feature list against a raw ion mobility acquisition
    Expand {
        /// Raw data file (JSON)
        #[arg(value_name = "RAW")]
        raw: PathBuf,

        /// Input features (JSON array)
        #[arg(value_name = "FEATURES")]
        features: PathBuf,

        /// Output feature list (JSON, defaults to <RAW>.expanded.json)
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Also write the features as wide-format Parquet
        #[arg(long, value_name = "FILE")]
        parquet: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ExpandOverrides,
    },

    /// Generate a synthetic raw file and feature list for testing
    Demo {
        /// Output directory
        #[arg(value_name = "DIR", default_value = "demo")]
        output: PathBuf,

        /// Number of frames
        #[arg(long, default_value = "60")]
        frames: usize,

        /// Number of mobility scans per frame
        #[arg(long, default_value = "100")]
        scans: usize,
    },

    /// Display information about a raw data file or an exported Parquet file
    Info {
        /// Input file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Expand {
            raw,
            features,
            output,
            parquet,
            config,
            overrides,
        } => expand::run(raw, features, output, parquet, config, overrides),
        Commands::Demo {
            output,
            frames,
            scans,
        } => demo::run(output, frames, scans),
        Commands::Info { file } => info::run(file),
    }
}
