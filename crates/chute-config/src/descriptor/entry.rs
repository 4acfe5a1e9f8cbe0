use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Build-target name → source module path(s).
///
/// Keys are unique. Insertion order is kept so that emitted output is
/// deterministic, but nothing depends on it semantically.
pub type EntryMap = IndexMap<String, EntrySource>;

/// Source module(s) of one build target.
///
/// ```toml
/// [entry]
/// app = "src/app.js"
/// admin = ["src/polyfills.js", "src/admin.js"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySource {
    Single(PathBuf),
    Multiple(Vec<PathBuf>),
}

impl EntrySource {
    /// All module paths of this target, in declared order.
    ///
    /// For multi-module targets every module is loaded and the exports of the
    /// last one become the target's exports.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            EntrySource::Single(path) => vec![path.as_path()],
            EntrySource::Multiple(paths) => paths.iter().map(PathBuf::as_path).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EntrySource::Single(path) => path.as_os_str().is_empty(),
            EntrySource::Multiple(paths) => paths.is_empty(),
        }
    }
}

impl From<&str> for EntrySource {
    fn from(path: &str) -> Self {
        EntrySource::Single(PathBuf::from(path))
    }
}

impl From<PathBuf> for EntrySource {
    fn from(path: PathBuf) -> Self {
        EntrySource::Single(path)
    }
}

impl From<Vec<PathBuf>> for EntrySource {
    fn from(paths: Vec<PathBuf>) -> Self {
        EntrySource::Multiple(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_multiple_deserialize() {
        let entries: EntryMap = serde_json::from_value(serde_json::json!({
            "app": "src/app.js",
            "admin": ["src/a.js", "src/b.js"],
        }))
        .unwrap();

        assert_eq!(entries["app"].paths(), vec![Path::new("src/app.js")]);
        assert_eq!(
            entries["admin"].paths(),
            vec![Path::new("src/a.js"), Path::new("src/b.js")]
        );
        assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["app", "admin"]);
    }

    #[test]
    fn empty_sources() {
        assert!(EntrySource::Multiple(vec![]).is_empty());
        assert!(EntrySource::Single(PathBuf::new()).is_empty());
        assert!(!EntrySource::from("a.js").is_empty());
    }
}
