//! Layered descriptor loading.
//!
//! Priority, lowest first: preset < config file < `CHUTE_*` environment
//! (`__` separates nesting, e.g. `CHUTE_OUTPUT__PUBLIC_PATH`) < `HOST` <
//! caller overrides.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use tracing::debug;

use crate::descriptor::{Descriptor, EntryMap, Mode};
use crate::discovery::{ConfigDiscovery, ConfigSource};
use crate::error::{ConfigError, Result};

/// Prefix of environment variables merged into the descriptor.
pub const ENV_PREFIX: &str = "CHUTE_";

/// Base layer the config file is merged onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// [`Descriptor::production`].
    #[default]
    Production,
    /// [`Descriptor::default`]: no rules, no plugins.
    Empty,
}

impl Preset {
    fn descriptor(self) -> Descriptor {
        match self {
            Preset::Production => Descriptor::production(),
            Preset::Empty => Descriptor::default(),
        }
    }
}

/// Values supplied by the caller (usually CLI flags). Unset fields leave the
/// lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub watch: Option<bool>,
    pub minimize: Option<bool>,
    /// Replaces the entry map wholesale when non-empty.
    pub entries: EntryMap,
}

/// Builds a [`Descriptor`] from preset, config file, environment and
/// overrides.
#[derive(Debug, Clone)]
pub struct DescriptorLoader {
    root: PathBuf,
    preset: Preset,
    config: Option<PathBuf>,
    discover: bool,
    use_env: bool,
    overrides: Overrides,
}

impl DescriptorLoader {
    /// Loader for a project rooted at `root`. Relative contexts resolve
    /// against it.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            preset: Preset::default(),
            config: None,
            discover: true,
            use_env: true,
            overrides: Overrides::default(),
        }
    }

    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Use this config file instead of discovering one.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    /// Skip config file discovery (an explicit `config_file` still applies).
    pub fn no_discovery(mut self) -> Self {
        self.discover = false;
        self
    }

    /// Ignore the process environment.
    pub fn no_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    fn source(&self) -> Result<Option<ConfigSource>> {
        match &self.config {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    self.root.join(path)
                };
                ConfigSource::from_path(path).map(Some)
            }
            None if self.discover => Ok(ConfigDiscovery::new(&self.root).find()),
            None => Ok(None),
        }
    }

    /// Assemble the figment without extracting it.
    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(self.preset.descriptor()));

        let source = self.source()?;
        let base = source
            .as_ref()
            .map(|s| s.dir().to_path_buf())
            .unwrap_or_else(|| self.root.clone());
        figment = figment.merge(Serialized::default("context", &base));

        if let Some(source) = &source {
            debug!(path = %source.path().display(), "loading config file");
            figment = figment.merge(Serialized::defaults(source.read_value()?));
        }

        if self.use_env {
            figment = figment
                .merge(Env::prefixed(ENV_PREFIX).split("__"))
                .merge(Env::raw().only(&["HOST"]));
        }

        let Overrides {
            mode,
            watch,
            minimize,
            entries: _,
        } = &self.overrides;
        if let Some(mode) = mode {
            figment = figment.merge(Serialized::default("mode", mode));
        }
        if let Some(watch) = watch {
            figment = figment.merge(Serialized::default("watch", watch));
        }
        if let Some(minimize) = minimize {
            figment = figment.merge(Serialized::default("optimization.minimize", minimize));
        }

        Ok(figment)
    }

    /// Load the descriptor.
    pub fn load(&self) -> Result<Descriptor> {
        let mut descriptor: Descriptor = self.figment()?.extract().map_err(figment_error)?;

        if descriptor.context.is_relative() {
            descriptor.context = self.root.join(&descriptor.context);
        }

        if !self.overrides.entries.is_empty() {
            descriptor.entry = self.overrides.entries.clone();
        }

        Ok(descriptor)
    }
}

fn figment_error(error: figment::Error) -> ConfigError {
    let field = if error.path.is_empty() {
        "configuration".to_string()
    } else {
        error.path.join(".")
    };
    ConfigError::InvalidValue {
        field,
        hint: Some(error.kind.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn preset_only() {
        let dir = TempDir::new().unwrap();
        let descriptor = DescriptorLoader::new(dir.path()).no_env().load().unwrap();
        assert_eq!(descriptor.output.filename, "local/[name]/[name].js");
        assert_eq!(descriptor.context, dir.path());
    }

    #[test]
    fn file_overrides_preset_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("chute.toml"),
            r#"
[entry]
app = "src/app.js"

[output]
public_path = "/static/"
"#,
        )
        .unwrap();

        let descriptor = DescriptorLoader::new(dir.path()).no_env().load().unwrap();
        assert_eq!(descriptor.output.public_path, "/static/");
        // untouched siblings keep preset values
        assert_eq!(descriptor.output.filename, "local/[name]/[name].js");
        assert_eq!(descriptor.entry.len(), 1);
        assert_eq!(descriptor.module.rules.len(), 12);
    }

    #[test]
    fn overrides_win() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("chute.json"),
            r#"{"watch": false, "entry": {"app": "src/app.js"}}"#,
        )
        .unwrap();

        let mut entries = EntryMap::new();
        entries.insert("admin".into(), "src/admin.js".into());
        let descriptor = DescriptorLoader::new(dir.path())
            .no_env()
            .overrides(Overrides {
                watch: Some(true),
                minimize: Some(false),
                entries,
                ..Default::default()
            })
            .load()
            .unwrap();

        assert!(descriptor.watch);
        assert!(!descriptor.optimization.minimize);
        assert_eq!(descriptor.entry.keys().collect::<Vec<_>>(), vec!["admin"]);
    }

    #[test]
    fn bad_type_reports_field() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("chute.toml"), "watch = \"often\"\n").unwrap();

        let err = DescriptorLoader::new(dir.path()).no_env().load().unwrap_err();
        match err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "watch"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_explicit_config() {
        let dir = TempDir::new().unwrap();
        let err = DescriptorLoader::new(dir.path())
            .config_file("nope.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
