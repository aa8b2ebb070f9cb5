//! Expansion settings and their TOML representation.
//!
//! ```toml
//! # ims-expander.toml
//! [expander]
//! use_raw_data = true
//! noise_level = 250.0
//! mz_tolerance = 0.005
//! mz_tolerance_ppm = 15.0
//! mobility_bin_width = 0.002
//! num_jobs = 8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::DataMode;
use crate::trace::MzTolerance;

/// Smallest accepted mobility bin width.
pub const MIN_MOBILITY_BIN_WIDTH: f64 = 1e-5;

/// Errors loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Options recognized by the expansion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderConfig {
    /// Sweep raw data points instead of centroided peak lists.
    pub use_raw_data: bool,

    /// Raw points with an intensity strictly below this are skipped.
    /// Only active when `use_raw_data` is set.
    pub noise_level: f64,

    /// Absolute m/z tolerance (Da) used to build trace windows from features.
    pub mz_tolerance: f64,

    /// Relative m/z tolerance (ppm); the wider window of the two applies.
    pub mz_tolerance_ppm: f64,

    /// Width of the mobility bins of the summed mobilogram.
    /// `None` sums per mobility scan number.
    pub mobility_bin_width: Option<f64>,

    /// Maximum number of independent expansion jobs (disjoint m/z slices);
    /// fewer run when overlapping windows leave no gap to cut at.
    pub num_jobs: usize,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            use_raw_data: false,
            noise_level: 0.0,
            mz_tolerance: 0.005,
            mz_tolerance_ppm: 15.0,
            mobility_bin_width: None,
            num_jobs: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
        }
    }
}

impl ExpanderConfig {
    /// Point list swept by the jobs.
    pub fn data_mode(&self) -> DataMode {
        if self.use_raw_data {
            DataMode::Raw
        } else {
            DataMode::Centroid
        }
    }

    /// Noise floor in effect, if any.
    pub fn effective_noise_level(&self) -> Option<f64> {
        self.use_raw_data.then_some(self.noise_level)
    }

    /// Tolerance used to derive trace windows.
    pub fn tolerance(&self) -> MzTolerance {
        MzTolerance::new(self.mz_tolerance, self.mz_tolerance_ppm)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.noise_level.is_finite() || self.noise_level < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "noise_level must be a non-negative number, got {}",
                self.noise_level
            )));
        }
        if !(self.mz_tolerance >= 0.0 && self.mz_tolerance_ppm >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "m/z tolerances must be non-negative, got {} Da / {} ppm",
                self.mz_tolerance, self.mz_tolerance_ppm
            )));
        }
        if self.mz_tolerance == 0.0 && self.mz_tolerance_ppm == 0.0 {
            return Err(ConfigError::Invalid(
                "at least one m/z tolerance must be positive".to_string(),
            ));
        }
        if let Some(width) = self.mobility_bin_width {
            if !(width.is_finite() && width >= MIN_MOBILITY_BIN_WIDTH) {
                return Err(ConfigError::Invalid(format!(
                    "mobility_bin_width must be at least {MIN_MOBILITY_BIN_WIDTH}, got {width}"
                )));
            }
        }
        if self.num_jobs == 0 {
            return Err(ConfigError::Invalid("num_jobs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Root structure of an `ims-expander.toml` file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Expansion settings.
    #[serde(default)]
    pub expander: ExpanderConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.expander.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [expander]
            use_raw_data = true
            noise_level = 250.0
            mz_tolerance = 0.01
            mz_tolerance_ppm = 10.0
            mobility_bin_width = 0.002
            num_jobs = 3
        "#;

        let config = Config::from_str(toml).unwrap();
        let expander = config.expander;
        assert!(expander.use_raw_data);
        assert_eq!(expander.noise_level, 250.0);
        assert_eq!(expander.mobility_bin_width, Some(0.002));
        assert_eq!(expander.num_jobs, 3);
        assert_eq!(expander.data_mode(), DataMode::Raw);
        assert_eq!(expander.effective_noise_level(), Some(250.0));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [expander]
            noise_level = 10.0
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.expander.noise_level, 10.0);
        assert!(!config.expander.use_raw_data);
        assert_eq!(config.expander.effective_noise_level(), None);
        assert_eq!(config.expander.mz_tolerance, 0.005);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.expander.data_mode(), DataMode::Centroid);
        assert!(config.expander.num_jobs >= 1);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_str("[expander]\nnoise_level = -1.0").is_err());
        assert!(Config::from_str("[expander]\nmobility_bin_width = 0.0").is_err());
        assert!(Config::from_str("[expander]\nmobility_bin_width = 1e-7").is_err());
        assert!(Config::from_str("[expander]\nmobility_bin_width = 1e-5").is_ok());
        assert!(Config::from_str("[expander]\nnum_jobs = 0").is_err());
        assert!(Config::from_str("[expander]\nmz_tolerance = 0.0\nmz_tolerance_ppm = 0.0").is_err());
        assert!(Config::from_str("[expander]\nuse_raw_data = \"yes\"").is_err());
    }
}
