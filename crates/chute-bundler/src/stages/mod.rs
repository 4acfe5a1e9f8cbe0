//! Transform stages and their registry.
//!
//! A stage takes one module's [`Source`] plus the options declared next to it
//! in a rule and returns the next [`Source`]. Side effects that outlive the
//! chain (emitted files, discovered dependencies, extracted stylesheets) are
//! recorded on the [`StageContext`].

mod babel;
mod css;
mod css_extract;
mod file;
mod postcss;
mod resolve_url;
mod sass;
mod url;
mod vue;

pub use babel::BabelStage;
pub use css::CssStage;
pub use css_extract::CssExtractStage;
pub use file::FileStage;
pub use postcss::PostcssStage;
pub use resolve_url::ResolveUrlStage;
pub use sass::SassStage;
pub use url::UrlStage;
pub use vue::VueStage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chute_config::ResolveLoaderOptions;
use chute_config::preset::stage as names;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::compilation::BuildEnv;
use crate::module::{Dependency, Source};
use crate::output::{Asset, AssetKind};
use crate::runtime::Runtime;

/// Names of the stages registered by [`StageRegistry::builtin`].
pub const BUILTIN_STAGES: &[&str] = &[
    names::VUE,
    names::BABEL,
    names::SASS,
    names::RESOLVE_URL,
    names::POSTCSS,
    names::CSS,
    names::CSS_EXTRACT,
    names::FILE,
    names::URL,
];

#[async_trait]
pub trait Stage: Send + Sync {
    /// Registry name, e.g. `css-loader`.
    fn name(&self) -> &str;

    /// Check an options record. Called once when the descriptor is compiled.
    fn validate(&self, _options: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source>;
}

/// Deserialize a stage or plugin options record; `null` means defaults.
pub fn parse_options<T: DeserializeOwned + Default>(options: &Value) -> anyhow::Result<T> {
    if options.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(options.clone())?)
}

static NULL_OPTIONS: Value = Value::Null;

/// Everything a stage may read, plus what it records for the compilation.
pub struct StageContext<'a> {
    /// Absolute path of the module (no query).
    pub resource: &'a Path,
    /// `?query` of the request, if any.
    pub query: Option<&'a str>,
    /// Options declared next to this stage.
    pub options: &'a Value,
    /// Content of the file before the first stage ran.
    pub original: &'a [u8],
    pub env: &'a BuildEnv,
    /// Filesystem access for files a stage looks up beyond its input.
    pub runtime: &'a dyn Runtime,
    pub(crate) effects: StageEffects,
}

/// Side effects recorded by the stages of one chain.
#[derive(Debug, Default)]
pub(crate) struct StageEffects {
    pub dependencies: Vec<Dependency>,
    pub assets: Vec<Asset>,
    pub extracted_css: Option<String>,
    pub exported_url: Option<String>,
    pub url_roots: Vec<PathBuf>,
    pub virtual_modules: Vec<(PathBuf, Vec<u8>)>,
}

impl<'a> StageContext<'a> {
    pub(crate) fn new(
        resource: &'a Path,
        query: Option<&'a str>,
        original: &'a [u8],
        env: &'a BuildEnv,
        runtime: &'a dyn Runtime,
    ) -> Self {
        Self {
            resource,
            query,
            options: &NULL_OPTIONS,
            original,
            env,
            runtime,
            effects: StageEffects::default(),
        }
    }

    pub fn options<T: DeserializeOwned + Default>(&self) -> anyhow::Result<T> {
        parse_options(self.options)
    }

    /// Directory of the resource.
    pub fn resource_dir(&self) -> &Path {
        self.resource.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Record a request to another module.
    pub fn add_dependency(&mut self, dependency: Dependency) {
        self.effects.dependencies.push(dependency);
    }

    /// Emit a file below the output directory. `name` may carry a query.
    pub fn emit_file(&mut self, name: impl Into<String>, content: Vec<u8>) {
        self.effects
            .assets
            .push(Asset::new(name, content, AssetKind::File));
    }

    /// Value the module exports as its public URL.
    pub fn export_url(&mut self, url: impl Into<String>) {
        self.effects.exported_url = Some(url.into());
    }

    /// Hand CSS over to the stylesheet extraction plugin.
    pub fn extract_css(&mut self, css: String) {
        self.effects.extracted_css = Some(css);
    }

    /// Extra directory tried when resolving relative `url()` requests.
    pub fn add_url_root(&mut self, dir: PathBuf) {
        if !self.effects.url_roots.contains(&dir) {
            self.effects.url_roots.push(dir);
        }
    }

    /// Register an in-memory module that can be requested like a file.
    pub fn add_virtual_module(&mut self, path: PathBuf, content: Vec<u8>) {
        self.effects.virtual_modules.push((path, content));
    }
}

/// Stages by registry name.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: FxHashMap<String, Arc<dyn Stage>>,
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.stages.keys().collect();
        names.sort();
        f.debug_struct("StageRegistry").field("stages", &names).finish()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in stage.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(VueStage));
        registry.register(Arc::new(BabelStage));
        registry.register(Arc::new(SassStage));
        registry.register(Arc::new(ResolveUrlStage));
        registry.register(Arc::new(PostcssStage));
        registry.register(Arc::new(CssStage));
        registry.register(Arc::new(CssExtractStage));
        registry.register(Arc::new(FileStage));
        registry.register(Arc::new(UrlStage));
        registry
    }

    /// Register a stage under its own name, replacing any previous one.
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.insert(stage.name().to_string(), stage);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.get(name)
    }

    /// Find a stage for `request`, trying the `resolveLoader` name patterns
    /// in order. Returns the name it was found under.
    pub fn lookup(
        &self,
        request: &str,
        options: &ResolveLoaderOptions,
    ) -> Option<(String, Arc<dyn Stage>)> {
        options
            .candidates(request)
            .into_iter()
            .find_map(|name| self.stages.get(&name).map(|s| (name.clone(), s.clone())))
    }
}

/// Quote `value` as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    // JSON strings are valid JS string literals apart from U+2028/U+2029.
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_registered() {
        let registry = StageRegistry::builtin();
        for name in BUILTIN_STAGES {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn lookup_prefers_exact_name() {
        let registry = StageRegistry::builtin();
        let loader = ResolveLoaderOptions::default();
        let (name, _) = registry.lookup("file-loader", &loader).unwrap();
        assert_eq!(name, "file-loader");
        let (name, _) = registry.lookup("url", &loader).unwrap();
        assert_eq!(name, "url-loader");
        assert!(registry.lookup("less", &loader).is_none());
    }

    #[test]
    fn js_string_escapes() {
        assert_eq!(js_string("a\"b\n"), r#""a\"b\n""#);
        assert_eq!(js_string("\u{2028}"), r#""\u2028""#);
    }
}
