//! The build pipeline descriptor and its sections.

mod entry;
pub(crate) mod helpers;
mod output;
mod plugin;
mod resolve;
mod rule;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use entry::{EntryMap, EntrySource};
pub use helpers::DEFAULT_HOST;
pub use output::OutputOptions;
pub use plugin::{OptimizationOptions, PluginSpec};
pub use resolve::{ResolveLoaderOptions, ResolveOptions};
pub use rule::{ModuleOptions, Rule, StageRef};

use helpers::{default_aggregate_timeout, default_context, default_host};

/// Build mode. `production` defines `process.env.NODE_ENV` as `"production"`
/// in scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
    None,
}

impl Mode {
    /// Value substituted for `process.env.NODE_ENV`, if any.
    pub fn node_env(self) -> Option<&'static str> {
        match self {
            Mode::Production => Some("production"),
            Mode::Development => Some("development"),
            Mode::None => None,
        }
    }
}

/// Source map setting. Only "off" is supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Devtool {
    Flag(bool),
    Named(String),
}

impl Default for Devtool {
    fn default() -> Self {
        Devtool::Flag(false)
    }
}

impl Devtool {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Devtool::Flag(false))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Delay before rebuilding after the first change, in milliseconds.
    /// Further changes within the window are folded into the same rebuild.
    #[serde(default = "default_aggregate_timeout")]
    pub aggregate_timeout: u64,

    /// Path fragments ignored by the watcher.
    #[serde(default)]
    pub ignored: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            aggregate_timeout: default_aggregate_timeout(),
            ignored: Vec::new(),
        }
    }
}

/// Build Pipeline Descriptor.
///
/// Constructed once per process from static declarations and environment
/// variables, consumed once per build, never mutated by the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default)]
    pub mode: Mode,

    /// Project root. Relative paths elsewhere in the descriptor are resolved
    /// against it.
    #[serde(default = "default_context")]
    pub context: PathBuf,

    #[serde(default)]
    pub entry: EntryMap,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub module: ModuleOptions,

    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    #[serde(default)]
    pub resolve: ResolveOptions,

    #[serde(default)]
    pub resolve_loader: ResolveLoaderOptions,

    #[serde(default)]
    pub optimization: OptimizationOptions,

    #[serde(default)]
    pub watch: bool,

    #[serde(default)]
    pub watch_options: WatchOptions,

    #[serde(default)]
    pub devtool: Devtool,

    /// Base URL of the surrounding build scripts (`HOST`). Carried, not used
    /// by the dispatch runtime.
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            context: default_context(),
            entry: EntryMap::new(),
            output: OutputOptions::default(),
            module: ModuleOptions::default(),
            plugins: Vec::new(),
            resolve: ResolveOptions::default(),
            resolve_loader: ResolveLoaderOptions::default(),
            optimization: OptimizationOptions::default(),
            watch: false,
            watch_options: WatchOptions::default(),
            devtool: Devtool::default(),
            host: default_host(),
        }
    }
}

impl Descriptor {
    /// Create from a `serde_json::Value` (programmatic config).
    pub fn from_value(value: Value) -> crate::Result<Self> {
        serde_json::from_value(value).map_err(|e| crate::ConfigError::InvalidValue {
            field: "descriptor".to_string(),
            hint: Some(e.to_string()),
        })
    }

    pub fn to_value(&self) -> crate::Result<Value> {
        serde_json::to_value(self).map_err(|e| crate::ConfigError::InvalidValue {
            field: "descriptor".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Add or replace a build target.
    pub fn with_entry(mut self, name: impl Into<String>, source: impl Into<EntrySource>) -> Self {
        self.entry.insert(name.into(), source.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<PathBuf>) -> Self {
        self.context = context.into();
        self
    }

    /// Resolve a descriptor-relative path against the context.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.context.join(path)
        }
    }

    /// Absolute (context-joined) output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output.path)
    }

    /// Position of the first plugin registered under `name`.
    pub fn plugin_position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn devtool_forms() {
        let d: Devtool = serde_json::from_value(json!(false)).unwrap();
        assert!(d.is_disabled());
        let d: Devtool = serde_json::from_value(json!("source-map")).unwrap();
        assert!(!d.is_disabled());
    }

    #[test]
    fn node_env_per_mode() {
        assert_eq!(Mode::Production.node_env(), Some("production"));
        assert_eq!(Mode::None.node_env(), None);
    }

    #[test]
    fn resolve_path_against_context() {
        let d = Descriptor::default().with_context("/project");
        assert_eq!(
            d.resolve_path(Path::new("local/assets")),
            PathBuf::from("/project/local/assets")
        );
        assert_eq!(d.resolve_path(Path::new("/abs")), PathBuf::from("/abs"));
    }

    #[test]
    fn from_value_roundtrip_keeps_entries() {
        let d = Descriptor::from_value(json!({
            "entry": { "app": "src/app.js" },
            "output": { "filename": "[name].js", "path": "out" }
        }))
        .unwrap();
        assert_eq!(d.entry.len(), 1);
        assert_eq!(d.output.path, PathBuf::from("out"));
        assert_eq!(d.output.public_path, "/");
    }
}
