use std::path::PathBuf;

use thiserror::Error;

/// Errors arising from configuration loading, saving, and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file exists but does not parse. By the time this is
    /// returned the offending file has already been renamed to `backup`.
    #[error("invalid json in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to back up invalid config {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
