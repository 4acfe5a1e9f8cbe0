use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::helpers::{default_true, is_null};

/// A lifecycle participant: a registered plugin name and its options record.
///
/// Registration order is significant (cleanup must be registered before
/// anything that writes into the directories it removes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "is_null")]
    pub options: Value,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Value::Null,
        }
    }

    pub fn with_options(name: impl Into<String>, options: Value) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// `optimization` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOptions {
    /// Run the minimizers. Defaults to on.
    #[serde(default = "default_true")]
    pub minimize: bool,

    /// Minimizers, run in order after every plugin's optimize hook.
    #[serde(default)]
    pub minimizer: Vec<PluginSpec>,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            minimize: true,
            minimizer: Vec::new(),
        }
    }
}
