//! Command-line interface definition.
//!
//! - `chute build` - build the assets described by the project's descriptor
//! - `chute check` - validate the descriptor and print its rule table

mod commands;
pub mod enums;
mod tests;
mod validation;

use clap::Parser;

pub use commands::{BuildArgs, CheckArgs, Command, ProjectArgs};
pub use enums::*;
pub use validation::parse_entry;

/// chute - rule-based asset bundler
#[derive(Parser, Debug)]
#[command(
    name = "chute",
    version,
    about = "Rule-based asset bundler",
    long_about = "chute builds a site's scripts, stylesheets, fonts, images and template\n\
                  partials. Every file reachable from an entry goes to the first rule whose\n\
                  pattern matches its path and runs through that rule's stage chain."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows which rule every module was dispatched to.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
