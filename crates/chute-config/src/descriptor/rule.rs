use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::helpers::is_null;

/// `module` section: the ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleOptions {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One dispatch rule.
///
/// `test`, `include` and `exclude` are regular expressions matched against
/// the module's path (forward slashes, query excluded). A rule applies when
/// `test` matches, `include` (if any) matches and `exclude` (if any) does not.
///
/// `use` lists the stages in execution order: the first stage receives the
/// raw file, each following stage receives the previous one's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub test: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    #[serde(rename = "use", alias = "loaders")]
    pub stages: Vec<StageRef>,
}

impl Rule {
    pub fn new(test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            include: None,
            exclude: None,
            stages: Vec::new(),
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include = Some(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    /// Append a stage to the end of the chain.
    pub fn stage(mut self, stage: impl Into<StageRef>) -> Self {
        self.stages.push(stage.into());
        self
    }
}

/// Reference to a named transform stage plus its options record.
///
/// Accepts either `"css-loader"` or `{ loader = "css-loader", options = {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StageRefRepr")]
pub struct StageRef {
    pub loader: String,

    #[serde(default, skip_serializing_if = "is_null")]
    pub options: Value,
}

impl StageRef {
    pub fn new(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: Value::Null,
        }
    }

    pub fn with_options(loader: impl Into<String>, options: Value) -> Self {
        Self {
            loader: loader.into(),
            options,
        }
    }
}

impl From<&str> for StageRef {
    fn from(loader: &str) -> Self {
        StageRef::new(loader)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StageRefRepr {
    Name(String),
    Full {
        loader: String,
        #[serde(default)]
        options: Value,
    },
}

impl From<StageRefRepr> for StageRef {
    fn from(repr: StageRefRepr) -> Self {
        match repr {
            StageRefRepr::Name(loader) => StageRef::new(loader),
            StageRefRepr::Full { loader, options } => StageRef { loader, options },
        }
    }
}
