//! # chute-bundler
//!
//! The dispatch runtime behind a chute [`Descriptor`]: every file reachable
//! from an entry point goes to the first rule whose pattern accepts its path,
//! runs through that rule's stage chain, and ends up as emitted assets at
//! templated paths. Lifecycle plugins clean the output before the build,
//! extract stylesheets after it and minify what was emitted.
//!
//! ```no_run
//! use chute_bundler::Bundler;
//! use chute_config::Descriptor;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = Descriptor::production()
//!     .with_context("/srv/site")
//!     .with_entry("app", "src/app.js");
//!
//! let report = Bundler::new(descriptor).build().await?;
//! for asset in &report.assets {
//!     println!("{} ({} bytes)", asset.name, asset.size);
//! }
//! # Ok(()) }
//! ```

pub mod builtins;
pub mod compilation;
pub mod hash;
pub mod linker;
pub mod module;
pub mod output;
pub mod pipeline;
pub mod plugins;
pub mod resolver;
pub mod rules;
pub mod runtime;
pub mod stages;
pub mod template;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging};

pub use chute_config::{Descriptor, Mode};
pub use compilation::{BuildEnv, ModuleGraph};
pub use module::{Dependency, DependencyKind, ImportCondition, ModuleId, ModuleRecord, Source};
pub use output::{Asset, AssetKind, AssetMap, EmittedFile};
pub use pipeline::{BuildReport, Bundler, CompiledPipeline};
pub use plugins::{LifecyclePlugin, PluginCatalog, PluginContext, PluginPhase};
pub use rules::{Dispatch, RuleSet};
pub use runtime::{NativeRuntime, Runtime, RuntimeError};
pub use stages::{Stage, StageContext, StageRegistry};

use std::path::PathBuf;

/// Error types for chute-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] chute_config::ConfigError),

    /// A rule pattern is not a valid regular expression.
    #[error("Invalid pattern in module.rules[{rule}].{field}: {source}")]
    InvalidPattern {
        rule: usize,
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown stage '{name}' in module.rules[{rule}]")]
    UnknownStage { name: String, rule: usize },

    #[error("Unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("Invalid options for stage '{stage}': {message}")]
    StageOptions { stage: String, message: String },

    #[error("Invalid options for plugin '{plugin}': {message}")]
    PluginOptions { plugin: String, message: String },

    #[error("Invalid template: {0}")]
    Template(#[from] template::TemplateError),

    /// No rule accepts a file and its type is not understood natively.
    #[error("No rule matches {}", .0.display())]
    NoMatchingRule(PathBuf),

    #[error("Cannot resolve '{request}' from {}: {message}", .from.display())]
    Resolve {
        request: String,
        from: PathBuf,
        message: String,
    },

    /// A stage failed while transforming a module.
    #[error("{stage} failed on {}: {message}", .path.display())]
    Stage {
        stage: String,
        path: PathBuf,
        message: String,
    },

    #[error("Cannot link {}: {message}", .path.display())]
    Link { path: PathBuf, message: String },

    /// A lifecycle plugin or minimizer failed.
    #[error("{plugin}: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Conflicting content for asset '{0}'")]
    AssetConflict(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for chute-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors raised while compiling the descriptor, before anything is read
    /// or written.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidPattern { .. }
                | Error::UnknownStage { .. }
                | Error::UnknownPlugin(_)
                | Error::StageOptions { .. }
                | Error::PluginOptions { .. }
                | Error::Template(_)
        )
    }

    pub(crate) fn stage(stage: &str, path: impl Into<PathBuf>, error: anyhow::Error) -> Self {
        Error::Stage {
            stage: stage.to_string(),
            path: path.into(),
            message: format!("{error:#}"),
        }
    }

    pub(crate) fn plugin(plugin: &str, message: impl std::fmt::Display) -> Self {
        Error::Plugin {
            plugin: plugin.to_string(),
            message: message.to_string(),
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "INVALID_CONFIG",
            Error::InvalidPattern { .. } => "INVALID_PATTERN",
            Error::UnknownStage { .. } => "UNKNOWN_STAGE",
            Error::UnknownPlugin(_) => "UNKNOWN_PLUGIN",
            Error::StageOptions { .. } => "STAGE_OPTIONS",
            Error::PluginOptions { .. } => "PLUGIN_OPTIONS",
            Error::Template(_) => "INVALID_TEMPLATE",
            Error::NoMatchingRule(_) => "NO_MATCHING_RULE",
            Error::Resolve { .. } => "UNRESOLVED",
            Error::Stage { .. } => "TRANSFORM_ERROR",
            Error::Link { .. } => "LINK_ERROR",
            Error::Plugin { .. } => "PLUGIN_ERROR",
            Error::AssetConflict(_) => "ASSET_CONFLICT",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::Runtime(_) | Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Config(e) => e
                .hint()
                .map(|h| Box::new(h.to_string()) as Box<dyn std::fmt::Display>),
            Error::UnknownStage { name, .. } => Some(Box::new(format!(
                "'{name}' is not a registered stage. Built-in stages: {}",
                stages::BUILTIN_STAGES.join(", ")
            ))),
            Error::UnknownPlugin(name) => Some(Box::new(format!(
                "'{name}' is not a registered plugin. Built-in plugins: {}",
                plugins::BUILTIN_PLUGINS.join(", ")
            ))),
            Error::NoMatchingRule(path) => Some(Box::new(format!(
                "Add a rule whose test matches '{}', or remove the import.",
                path.display()
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The path '{path}' is invalid. Ensure it's within the project directory and doesn't contain '..' components."
            ))),
            Error::AssetConflict(name) => Some(Box::new(format!(
                "Two modules emit '{name}' with different content. Add [hash] or [path] to the name template."
            ))),
            _ => None,
        }
    }
}
