use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::enums::ModeArg;
use crate::cli::validation::parse_entry;
use chute_config::EntrySource;

/// Available chute subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project's assets
    ///
    /// Loads the descriptor (production preset, chute.toml, CHUTE_*
    /// environment, then flags), runs the build and writes every asset
    /// below the output directory.
    Build(BuildArgs),

    /// Validate the descriptor without building
    ///
    /// Resolves every stage and plugin name, checks options and entry
    /// paths, then prints the dispatch rules in match order.
    Check(CheckArgs),
}

/// Where the project lives and which descriptor to load.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Path to a config file (chute.toml or chute.json)
    ///
    /// Relative paths resolve against --root. Without this flag the root
    /// is searched for chute.toml, chute.json, then a `chute` field in
    /// package.json.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// Build target as NAME=PATH (repeatable)
    ///
    /// Replaces the entries of the config file.
    ///
    /// Examples:
    ///   chute build -e app=src/app.js
    ///   chute build -e app=src/app.js -e admin=src/admin.js
    #[arg(short, long = "entry", value_name = "NAME=PATH", value_parser = parse_entry)]
    pub entries: Vec<(String, EntrySource)>,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Rebuild whenever a file below the root changes
    #[arg(short, long)]
    pub watch: bool,

    /// Skip script minification
    #[arg(long)]
    pub no_minify: bool,

    /// Build mode
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<ModeArg>,
}

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the resolved descriptor as JSON instead of the rule table
    #[arg(long)]
    pub json: bool,
}
