//! Settings errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The merged layers do not fit the settings schema (e.g. a string where
    /// a number belongs).
    #[error("settings do not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

impl SettingsError {
    /// Error category string for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io { .. } => "filesystem",
            Self::Json { .. } => "parse",
            Self::Shape(_) => "schema",
        }
    }
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
