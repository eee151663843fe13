use engine_core::error::{PoolError, WriteError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating run settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings document is not valid JSON for this schema.
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidOverride {
        key: String,
        value: String,
        reason: String,
    },

    /// A setting is outside its allowed range.
    #[error("Invalid setting '{setting}': {reason}")]
    Invalid { setting: &'static str, reason: String },

    /// Pool sizing is inconsistent.
    #[error("Pool settings error: {0}")]
    Pool(#[from] PoolError),

    /// Output format cannot be built from the settings.
    #[error("Output settings error: {0}")]
    Output(#[from] WriteError),
}
