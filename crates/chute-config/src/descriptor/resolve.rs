use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::helpers::{default_extensions, default_module_extensions, default_modules};

/// Module resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Logical name → concrete path or package request.
    ///
    /// `vue` matches `vue` and `vue/...`; a trailing `$` (`vue$`) matches only
    /// the exact request.
    #[serde(default)]
    pub alias: IndexMap<String, String>,

    /// Directories searched for bare requests, in order. Plain names
    /// (`node_modules`) are looked up in every ancestor of the importer;
    /// absolute paths are searched as-is.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Extensions tried, in order, when a request omits one. `*` stands for
    /// "the request exactly as written", which is always tried first.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            alias: IndexMap::new(),
            modules: default_modules(),
            extensions: default_extensions(),
        }
    }
}

/// Stage name resolution (`resolveLoader`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveLoaderOptions {
    /// Stage search locations. Kept for descriptor fidelity; stages are looked
    /// up in the in-process registry.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    /// Name patterns tried in order; `*` is replaced by the requested name,
    /// so `babel` finds `babel-loader` through `*-loader`.
    #[serde(default = "default_module_extensions")]
    pub module_extensions: Vec<String>,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ResolveLoaderOptions {
    fn default() -> Self {
        Self {
            modules: default_modules(),
            module_extensions: default_module_extensions(),
            extensions: default_extensions(),
        }
    }
}

impl ResolveLoaderOptions {
    /// Candidate registry names for a requested stage, in lookup order.
    ///
    /// The request itself always comes first.
    pub fn candidates(&self, request: &str) -> Vec<String> {
        let mut names = vec![request.to_string()];
        for pattern in &self.module_extensions {
            let name = pattern.replace('*', request);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}
