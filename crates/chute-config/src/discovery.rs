//! Config file discovery.
//!
//! Looks for a chute config in the project root. The file is not parsed here
//! beyond what is needed to tell whether `package.json` carries a `chute`
//! field; layering is done by [`crate::DescriptorLoader`].

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Name of the TOML config file.
pub const TOML_CONFIG: &str = "chute.toml";
/// Name of the JSON config file.
pub const JSON_CONFIG: &str = "chute.json";
/// Field of `package.json` holding an embedded config.
pub const PACKAGE_FIELD: &str = "chute";

/// A discovered config file and its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Toml(PathBuf),
    Json(PathBuf),
    /// `package.json` with a non-null `chute` field.
    PackageJson(PathBuf),
}

impl ConfigSource {
    /// Classify an explicitly given path by its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }

        if path.file_name().is_some_and(|name| name == "package.json") {
            return Ok(ConfigSource::PackageJson(path));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigSource::Toml(path)),
            Some("json") => Ok(ConfigSource::Json(path)),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Toml(path) | ConfigSource::Json(path) | ConfigSource::PackageJson(path) => {
                path
            }
        }
    }

    /// Directory containing the config. Used as the default context.
    pub fn dir(&self) -> &Path {
        self.path().parent().unwrap_or_else(|| Path::new("."))
    }

    /// Parse the file into a JSON value. For `package.json` only the `chute`
    /// field is returned.
    pub fn read_value(&self) -> Result<Value> {
        let content = fs::read_to_string(self.path())?;
        match self {
            ConfigSource::Toml(_) => {
                let value: toml::Value =
                    toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                        field: TOML_CONFIG.to_string(),
                        hint: Some(format!("Invalid TOML syntax: {e}")),
                    })?;
                serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
                    field: TOML_CONFIG.to_string(),
                    hint: Some(e.to_string()),
                })
            }
            ConfigSource::Json(_) => {
                serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                    field: JSON_CONFIG.to_string(),
                    hint: Some(format!("Invalid JSON: {e}")),
                })
            }
            ConfigSource::PackageJson(_) => {
                let parsed: Value =
                    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                        field: "package.json".to_string(),
                        hint: Some(format!("Invalid JSON: {e}")),
                    })?;
                match parsed.get(PACKAGE_FIELD) {
                    Some(value) if !value.is_null() => Ok(value.clone()),
                    _ => Err(ConfigError::InvalidValue {
                        field: PACKAGE_FIELD.to_string(),
                        hint: Some("Add a 'chute' object to package.json".to_string()),
                    }),
                }
            }
        }
    }
}

/// Searches a project root for a config file.
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory.
    ///
    /// Searches in this order:
    /// 1. `chute.toml`
    /// 2. `chute.json`
    /// 3. `package.json` (`chute` field)
    pub fn find(&self) -> Option<ConfigSource> {
        let toml_path = self.root.join(TOML_CONFIG);
        if toml_path.is_file() {
            return Some(ConfigSource::Toml(toml_path));
        }

        let json_path = self.root.join(JSON_CONFIG);
        if json_path.is_file() {
            return Some(ConfigSource::Json(json_path));
        }

        let pkg_path = self.root.join("package.json");
        let has_field = fs::read_to_string(&pkg_path)
            .ok()
            .and_then(|content| serde_json::from_str::<Value>(&content).ok())
            .is_some_and(|parsed| parsed.get(PACKAGE_FIELD).is_some_and(|v| !v.is_null()));
        if has_field {
            return Some(ConfigSource::PackageJson(pkg_path));
        }

        None
    }

    /// Like [`find`](Self::find) but a missing config is an error.
    pub fn require(&self) -> Result<ConfigSource> {
        self.find()
            .ok_or_else(|| ConfigError::NotFound(self.root.join(TOML_CONFIG)))
    }
}
