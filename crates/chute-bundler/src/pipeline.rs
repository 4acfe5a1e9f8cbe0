//! Building a [`Descriptor`] end to end.
//!
//! ```text
//! compile:  schema → rules (regex + stage lookup + option checks)
//!           → plugins → output template
//! run:      start plugins → module graph → link entries
//!           → emit plugins → optimize plugins → minimizers → write
//! ```
//!
//! Everything that can be rejected without touching the filesystem is
//! rejected by [`Bundler::compile`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chute_config::preset::{plugin, stage};
use chute_config::{Descriptor, EntryMap, ResolveOptions, validate_schema};
use serde_json::Value;
use tracing::{debug, info};

use crate::compilation::{BuildEnv, Compilation, ModuleGraph};
use crate::hash::content_hash;
use crate::linker;
use crate::output::{Asset, AssetKind, AssetMap, EmittedFile, write_assets};
use crate::plugins::{LifecyclePlugin, PluginCatalog, PluginContext, PluginPhase, PluginRegistry};
use crate::rules::RuleSet;
use crate::runtime::{NativeRuntime, Runtime};
use crate::stages::{Stage, StageRegistry};
use crate::template::{CHUNK_PLACEHOLDERS, Template, TemplateData};
use crate::{Error, Result};

/// Stages that only work when their companion plugin is registered.
const COMPANIONS: &[(&str, &str)] = &[
    (stage::VUE, plugin::VUE),
    (stage::CSS_EXTRACT, plugin::CSS_EXTRACT),
];

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Files written, in emission order.
    pub assets: Vec<EmittedFile>,
    pub graph: ModuleGraph,
    pub duration: Duration,
}

impl BuildReport {
    pub fn modules(&self) -> usize {
        self.graph.len()
    }

    pub fn asset(&self, name: &str) -> Option<&EmittedFile> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Builds one descriptor.
///
/// The built-in stages and plugins are registered up front; embedders can
/// add or replace entries before building.
#[derive(Debug, Clone)]
pub struct Bundler {
    descriptor: Descriptor,
    runtime: Arc<dyn Runtime>,
    stages: StageRegistry,
    plugins: PluginCatalog,
}

impl Bundler {
    pub fn new(descriptor: Descriptor) -> Self {
        let runtime = Arc::new(NativeRuntime::new(descriptor.context.clone()));
        Self {
            descriptor,
            runtime,
            stages: StageRegistry::builtin(),
            plugins: PluginCatalog::builtin(),
        }
    }

    /// Route all filesystem access through `runtime`.
    pub fn with_runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn register_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.register(stage);
        self
    }

    pub fn register_plugin<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Arc<dyn LifecyclePlugin>> + Send + Sync + 'static,
    {
        self.plugins.register(name, factory);
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Validate the descriptor and resolve every name it mentions.
    pub fn compile(&self) -> Result<CompiledPipeline> {
        let descriptor = &self.descriptor;
        validate_schema(descriptor)?;

        let rules = RuleSet::compile(
            &descriptor.module.rules,
            &self.stages,
            &descriptor.resolve_loader,
        )?;
        let env = BuildEnv::from_descriptor(descriptor);

        for (stage_name, plugin_name) in COMPANIONS {
            let used = rules
                .rules()
                .iter()
                .flat_map(|rule| &rule.chain)
                .any(|bound| bound.stage.name() == *stage_name);
            if used && !env.has_plugin(plugin_name) {
                return Err(Error::StageOptions {
                    stage: stage_name.to_string(),
                    message: format!("requires the '{plugin_name}' plugin to be registered"),
                });
            }
        }

        let plugins = descriptor
            .plugins
            .iter()
            .map(|spec| self.plugins.instantiate(spec))
            .collect::<Result<Vec<_>>>()?;
        let minimizers = descriptor
            .optimization
            .minimizer
            .iter()
            .map(|spec| self.plugins.instantiate(spec))
            .collect::<Result<Vec<_>>>()?;
        let filename = Template::parse(&descriptor.output.filename, CHUNK_PLACEHOLDERS)?;

        debug!(
            rules = rules.rules().len(),
            plugins = plugins.len(),
            minimizers = minimizers.len(),
            "descriptor compiled"
        );

        Ok(CompiledPipeline {
            env,
            rules,
            resolve: descriptor.resolve.clone(),
            entries: descriptor.entry.clone(),
            plugins: PluginRegistry::new(plugins),
            minimizers,
            minimize: descriptor.optimization.minimize,
            filename,
            runtime: self.runtime.clone(),
        })
    }

    /// Compile and run.
    pub async fn build(&self) -> Result<BuildReport> {
        self.compile()?.run().await
    }
}

/// A descriptor with every name resolved, ready to run any number of times.
#[derive(Debug)]
pub struct CompiledPipeline {
    env: BuildEnv,
    rules: RuleSet,
    resolve: ResolveOptions,
    entries: EntryMap,
    plugins: PluginRegistry,
    minimizers: Vec<Arc<dyn LifecyclePlugin>>,
    minimize: bool,
    filename: Template,
    runtime: Arc<dyn Runtime>,
}

impl CompiledPipeline {
    pub fn env(&self) -> &BuildEnv {
        &self.env
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Script filename template.
    pub fn filename(&self) -> &Template {
        &self.filename
    }

    pub async fn run(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let mut assets = AssetMap::new();

        self.run_phase(PluginPhase::Start, None, &mut assets).await?;

        let (graph, module_assets) = Compilation::new(
            &self.env,
            &self.rules,
            &self.resolve,
            self.runtime.as_ref(),
        )
        .run(&self.entries)
        .await?;
        for asset in module_assets {
            assets.insert(asset)?;
        }

        for (index, (name, roots)) in graph.entries().iter().enumerate() {
            let code = linker::link_entry(&graph, &self.env, roots)?;
            let hash = content_hash(code.as_bytes());
            let id = index.to_string();
            let file = self.filename.render(&TemplateData {
                name: Some(name),
                id: Some(&id),
                hash: Some(&hash),
                ..Default::default()
            })?;
            assets.insert(Asset::new(file, code.into_bytes(), AssetKind::Script).for_entry(name))?;
        }

        self.run_phase(PluginPhase::Emit, Some(&graph), &mut assets)
            .await?;
        self.run_phase(PluginPhase::Optimize, Some(&graph), &mut assets)
            .await?;
        if self.minimize {
            for minimizer in &self.minimizers {
                self.apply(minimizer, Some(&graph), &mut assets).await?;
            }
        }

        let written = write_assets(self.runtime.as_ref(), &self.env.output_dir, &assets).await?;
        let duration = started.elapsed();
        info!(
            modules = graph.len(),
            assets = written.len(),
            ms = duration.as_millis() as u64,
            "build complete"
        );

        Ok(BuildReport {
            assets: written,
            graph,
            duration,
        })
    }

    async fn run_phase(
        &self,
        phase: PluginPhase,
        graph: Option<&ModuleGraph>,
        assets: &mut AssetMap,
    ) -> Result<()> {
        for plugin in self.plugins.in_phase(phase) {
            self.apply(plugin, graph, assets).await?;
        }
        Ok(())
    }

    async fn apply(
        &self,
        plugin: &Arc<dyn LifecyclePlugin>,
        graph: Option<&ModuleGraph>,
        assets: &mut AssetMap,
    ) -> Result<()> {
        debug!(plugin = plugin.name(), phase = ?plugin.phase(), "plugin");
        let mut cx = PluginContext {
            env: &self.env,
            runtime: self.runtime.as_ref(),
            graph,
            assets,
        };
        plugin
            .apply(&mut cx)
            .await
            .map_err(|e| Error::plugin(plugin.name(), format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chute_config::{PluginSpec, Rule, StageRef};

    fn descriptor() -> Descriptor {
        Descriptor::default()
            .with_context("/p")
            .with_entry("app", "src/app.js")
    }

    #[test]
    fn production_compiles() {
        let bundler = Bundler::new(Descriptor::production().with_entry("app", "src/app.js"));
        let pipeline = bundler.compile().unwrap();
        assert_eq!(pipeline.rules().rules().len(), 12);
        assert_eq!(pipeline.filename().as_str(), "local/[name]/[name].js");
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        let mut d = descriptor();
        d.module.rules.push(Rule::new(r"\.less$").stage("less-loader"));
        let err = Bundler::new(d).compile().unwrap_err();
        assert!(matches!(err, Error::UnknownStage { ref name, rule: 0 } if name == "less-loader"));
        assert!(err.is_configuration());

        let mut d = descriptor();
        d.plugins.push(PluginSpec::new("html-webpack"));
        assert!(matches!(
            Bundler::new(d).compile(),
            Err(Error::UnknownPlugin(_))
        ));

        let mut d = descriptor();
        d.output.filename = "[name].[ext]".to_string();
        assert!(matches!(Bundler::new(d).compile(), Err(Error::Template(_))));
    }

    #[test]
    fn malformed_stage_options() {
        let mut d = descriptor();
        d.module.rules.push(
            Rule::new(r"\.png$").stage(StageRef::with_options(
                stage::URL,
                serde_json::json!({ "limit": "lots" }),
            )),
        );
        assert!(matches!(
            Bundler::new(d).compile(),
            Err(Error::StageOptions { ref stage, .. }) if stage == "url-loader"
        ));
    }

    #[test]
    fn extraction_needs_its_plugin() {
        let mut d = descriptor();
        d.module.rules.push(
            Rule::new(r"\.css$")
                .stage(stage::CSS)
                .stage(stage::CSS_EXTRACT),
        );
        let err = Bundler::new(d.clone()).compile().unwrap_err();
        assert!(err.to_string().contains("css-extract"));

        d.plugins.push(PluginSpec::new(plugin::CSS_EXTRACT));
        assert!(Bundler::new(d).compile().is_ok());
    }
}
