//! Error handling for the chute CLI.
//!
//! [`CliError`] wraps the library errors so every command returns one type;
//! [`cli_error_to_miette`] renders it for the terminal with codes and hints.

mod report;

use std::path::PathBuf;
use thiserror::Error;

pub use report::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or validating the descriptor failed.
    #[error("Configuration error: {0}")]
    Config(#[from] chute_config::ConfigError),

    /// The build itself failed.
    #[error(transparent)]
    Build(#[from] chute_bundler::Error),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    /// Hint shown under the error message, when there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            CliError::Config(e) => e.hint().map(str::to_string),
            CliError::FileNotFound(_) => Some("Pass the project directory with --root".to_string()),
            CliError::Watch(_) => {
                Some("Run without --watch, or raise the system's file watch limit".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chute_config::ConfigError;

    #[test]
    fn test_cli_error_from_config_error() {
        let cli_err: CliError = ConfigError::NoEntries.into();
        assert!(matches!(cli_err, CliError::Config(_)));
        assert!(cli_err.to_string().contains("no entries specified"));
        assert!(cli_err.hint().unwrap().contains("[entry]"));
    }

    #[test]
    fn test_cli_error_from_build_error() {
        let build_err = chute_bundler::Error::NoMatchingRule(PathBuf::from("src/notes.txt"));
        let cli_err: CliError = build_err.into();
        assert!(matches!(cli_err, CliError::Build(_)));
        assert_eq!(cli_err.to_string(), "No rule matches src/notes.txt");
    }

    #[test]
    fn test_file_not_found_hint() {
        let err = CliError::FileNotFound(PathBuf::from("/missing"));
        assert!(err.to_string().contains("/missing"));
        assert!(err.hint().unwrap().contains("--root"));
    }
}
