//! Error types for descriptor loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Discovery / loading
    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid config value for '{field}'{}", hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    InvalidValue { field: String, hint: Option<String> },

    // Schema validation (no filesystem checks)
    #[error("no entries specified")]
    NoEntries,

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("unsupported option '{option}': {reason}")]
    Unsupported { option: String, reason: String },

    // Filesystem validation (CLI use)
    #[error("entry path not found: {0}")]
    EntryNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Hint text for the variants that carry one.
    pub fn hint(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { hint, .. } | ConfigError::SchemaValidation { hint, .. } => {
                hint.as_deref()
            }
            ConfigError::NoEntries => Some("Add an [entry] table, e.g. app = \"src/app.js\""),
            _ => None,
        }
    }
}
