//! Crate-level error type.

use crate::config::ConfigError;
use crate::job::PublishError;
use crate::source::SourceError;

/// Errors raised while preparing or running a trace expansion.
#[derive(Debug, thiserror::Error)]
pub enum ExpanderError {
    /// An m/z interval was empty, inverted, or not finite
    #[error("Invalid m/z range: [{lo}, {hi}]")]
    InvalidRange {
        /// Lower bound
        lo: f64,
        /// Upper bound
        hi: f64,
    },

    /// Error reading the raw acquisition
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Rows could not be handed to the output feature list
    #[error("Publish error: {0}")]
    PublishError(#[from] PublishError),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error serializing/deserializing JSON
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}
