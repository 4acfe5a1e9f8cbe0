//! Command-line interface for the chute asset bundler.
//!
//! - [`cli`] - argument definitions (clap derive)
//! - [`commands`] - `build` and `check`
//! - [`error`] - [`CliError`] and its miette rendering
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and the build summary
//! - [`watcher`] - change notifications for `build --watch`

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;
pub mod watcher;

pub use error::{CliError, Result};
