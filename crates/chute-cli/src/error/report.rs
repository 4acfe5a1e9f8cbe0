//! Miette rendering of CLI errors.

use miette::{MietteDiagnostic, Report};

use crate::error::CliError;

/// Convert a `CliError` into a report for the terminal.
///
/// Build errors keep their own diagnostic code and help; everything else
/// gets the hint from [`CliError::hint`].
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Config(ref e) => {
            let mut diagnostic = MietteDiagnostic::new(err.to_string()).with_code("INVALID_CONFIG");
            if let Some(hint) = e.hint() {
                diagnostic = diagnostic.with_help(hint);
            }
            Report::new(diagnostic)
        }
        other => {
            let mut diagnostic = MietteDiagnostic::new(other.to_string());
            if let Some(hint) = other.hint() {
                diagnostic = diagnostic.with_help(hint);
            }
            Report::new(diagnostic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn build_errors_keep_their_code() {
        let report = cli_error_to_miette(CliError::Build(chute_bundler::Error::NoMatchingRule(
            PathBuf::from("src/notes.txt"),
        )));
        assert_eq!(report.code().unwrap().to_string(), "NO_MATCHING_RULE");
    }

    #[test]
    fn config_errors_carry_hints() {
        let report = cli_error_to_miette(chute_config::ConfigError::NoEntries.into());
        assert_eq!(report.code().unwrap().to_string(), "INVALID_CONFIG");
        assert!(report.help().unwrap().to_string().contains("[entry]"));
    }
}
