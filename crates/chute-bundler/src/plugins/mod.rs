//! Lifecycle plugins.
//!
//! Plugins hook into the build at fixed phases rather than per module:
//! `start` runs before anything is read, `emit` after every module has been
//! processed, `optimize` over the finished asset set. Minimizers are plugins
//! too; they run after every plugin's optimize hook.

mod clean;
mod css_extract;
mod minify;
mod optimize_css;
mod vue;

pub use clean::CleanPlugin;
pub use css_extract::CssExtractPlugin;
pub use minify::ScriptMinifyPlugin;
pub use optimize_css::OptimizeCssPlugin;
pub use vue::VuePlugin;

use std::sync::Arc;

use async_trait::async_trait;
use chute_config::PluginSpec;
use chute_config::preset::plugin as names;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::compilation::{BuildEnv, ModuleGraph};
use crate::output::AssetMap;
use crate::runtime::Runtime;
use crate::{Error, Result};

/// Names of the plugins registered by [`PluginCatalog::builtin`].
pub const BUILTIN_PLUGINS: &[&str] = &[
    names::VUE,
    names::CLEAN,
    names::CSS_EXTRACT,
    names::OPTIMIZE_CSS,
    names::SCRIPT_MINIFY,
];

/// When a plugin runs. Plugins run in phase order; within a phase, in
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginPhase {
    /// Before any module is read or any file written.
    Start = 0,
    /// After the module graph is complete and scripts are linked.
    Emit = 10,
    /// Over the finished asset set, before it is written.
    Optimize = 20,
}

/// What a plugin sees when it runs.
pub struct PluginContext<'a> {
    pub env: &'a BuildEnv,
    pub runtime: &'a dyn Runtime,
    /// `None` during [`PluginPhase::Start`].
    pub graph: Option<&'a ModuleGraph>,
    pub assets: &'a mut AssetMap,
}

impl PluginContext<'_> {
    /// The module graph, or an error when called before it exists.
    pub fn graph(&self) -> anyhow::Result<&ModuleGraph> {
        self.graph
            .ok_or_else(|| anyhow::anyhow!("the module graph is not available before the emit phase"))
    }
}

#[async_trait]
pub trait LifecyclePlugin: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn phase(&self) -> PluginPhase;

    async fn apply(&self, cx: &mut PluginContext<'_>) -> anyhow::Result<()>;
}

/// Builds a plugin from its options record.
pub type PluginFactory =
    Arc<dyn Fn(&Value) -> anyhow::Result<Arc<dyn LifecyclePlugin>> + Send + Sync>;

/// Plugin factories by registry name.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: FxHashMap<String, PluginFactory>,
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("PluginCatalog").field("plugins", &names).finish()
    }
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every built-in plugin.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(names::VUE, |_| Ok(Arc::new(VuePlugin)));
        catalog.register(names::CLEAN, |options| {
            Ok(Arc::new(CleanPlugin::from_options(options)?))
        });
        catalog.register(names::CSS_EXTRACT, |options| {
            Ok(Arc::new(CssExtractPlugin::from_options(options)?))
        });
        catalog.register(names::OPTIMIZE_CSS, |options| {
            Ok(Arc::new(OptimizeCssPlugin::from_options(options)?))
        });
        catalog.register(names::SCRIPT_MINIFY, |options| {
            Ok(Arc::new(ScriptMinifyPlugin::from_options(options)?))
        });
        catalog
    }

    /// Register a factory, replacing any previous one under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn LifecyclePlugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the plugin a descriptor entry names.
    pub fn instantiate(&self, spec: &PluginSpec) -> Result<Arc<dyn LifecyclePlugin>> {
        let factory = self
            .factories
            .get(&spec.name)
            .ok_or_else(|| Error::UnknownPlugin(spec.name.clone()))?;
        factory(&spec.options).map_err(|e| Error::PluginOptions {
            plugin: spec.name.clone(),
            message: format!("{e:#}"),
        })
    }
}

/// Instantiated plugins of one build, ordered by phase.
#[derive(Debug, Clone, Default)]
pub(crate) struct PluginRegistry {
    plugins: Vec<Arc<dyn LifecyclePlugin>>,
}

impl PluginRegistry {
    /// Sorting is stable, so registration order holds within a phase.
    pub(crate) fn new(mut plugins: Vec<Arc<dyn LifecyclePlugin>>) -> Self {
        plugins.sort_by_key(|plugin| plugin.phase());
        Self { plugins }
    }

    pub(crate) fn in_phase(
        &self,
        phase: PluginPhase,
    ) -> impl Iterator<Item = &Arc<dyn LifecyclePlugin>> {
        self.plugins.iter().filter(move |p| p.phase() == phase)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.plugins.len()
    }
}
