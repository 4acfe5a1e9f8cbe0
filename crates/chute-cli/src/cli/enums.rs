//! Value enums accepted on the command line.

use chute_config::Mode;
use clap::ValueEnum;

/// Build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Optimized output, `process.env.NODE_ENV` is "production"
    Production,
    /// `process.env.NODE_ENV` is "development"
    Development,
    /// No mode-specific defaults
    None,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Production => Mode::Production,
            ModeArg::Development => Mode::Development,
            ModeArg::None => Mode::None,
        }
    }
}
