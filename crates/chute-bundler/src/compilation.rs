//! One compilation: walk every module reachable from the entries, dispatch
//! each to its rule, run the chain and record the results in a
//! [`ModuleGraph`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chute_config::{Descriptor, EntryMap, Mode, ResolveOptions};
use indexmap::IndexMap;
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::linker;
use crate::module::{
    Dependency, DependencyKind, ImportCondition, ModuleId, ModuleRecord, ResolvedDependency,
    Source, module_key,
};
use crate::output::AssetMap;
use crate::resolver::{ModuleResolver, Resolved, VirtualModules};
use crate::rules::{Dispatch, NativeKind, RuleSet, match_subject};
use crate::runtime::Runtime;
use crate::stages::{StageContext, StageEffects};
use crate::{Error, Result};

/// Read-only facts about the build every stage and plugin may consult.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Project root.
    pub context: PathBuf,
    /// Absolute output directory.
    pub output_dir: PathBuf,
    pub public_path: String,
    pub mode: Mode,
    /// Names of the lifecycle plugins registered for this build.
    pub plugins: Vec<String>,
}

impl BuildEnv {
    /// Paths are made absolute against the working directory.
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            context: absolute(&descriptor.context),
            output_dir: absolute(&descriptor.output_dir()),
            public_path: descriptor.output.public_path.clone(),
            mode: descriptor.mode,
            plugins: descriptor.plugins.iter().map(|p| p.name.clone()).collect(),
        }
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p == name)
    }

    /// Directory of `path` relative to the context, with a trailing slash;
    /// empty for files directly in the context or outside it.
    pub fn relative_dir(&self, path: &Path) -> String {
        let Some(dir) = path
            .parent()
            .and_then(|dir| dir.strip_prefix(&self.context).ok())
        else {
            return String::new();
        };
        let dir = dir.to_string_lossy().replace('\\', "/");
        if dir.is_empty() { dir } else { format!("{dir}/") }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .clean()
}

/// Every module of one build, indexed by [`ModuleId`].
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Vec<ModuleRecord>,
    by_key: FxHashMap<String, ModuleId>,
    entries: IndexMap<String, Vec<ModuleId>>,
}

impl ModuleGraph {
    pub fn modules(&self) -> &[ModuleRecord] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> &ModuleRecord {
        &self.modules[id.index()]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module for a path (and optional `?query`).
    pub fn find(&self, path: &Path, query: Option<&str>) -> Option<&ModuleRecord> {
        self.by_key
            .get(&module_key(path, query))
            .map(|id| self.module(*id))
    }

    /// Build target name → entry modules, in declared order.
    pub fn entries(&self) -> &IndexMap<String, Vec<ModuleId>> {
        &self.entries
    }

    /// Modules reachable from `roots` through script dependencies, sorted
    /// by id.
    pub fn script_closure(&self, roots: &[ModuleId]) -> Vec<ModuleId> {
        let mut seen: FxHashSet<ModuleId> = roots.iter().copied().collect();
        let mut queue: VecDeque<ModuleId> = roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for dep in self.module(id).script_dependencies() {
                if seen.insert(dep.module) {
                    queue.push_back(dep.module);
                }
            }
        }
        let mut ids: Vec<_> = seen.into_iter().collect();
        ids.sort();
        ids
    }

    /// Modules reachable from `roots` through any dependency, dependencies
    /// before their importers. Each comes with the `@import` conditions on
    /// the path that first reached it, outermost first.
    pub fn style_order(&self, roots: &[ModuleId]) -> Vec<(ModuleId, Vec<ImportCondition>)> {
        fn visit(
            graph: &ModuleGraph,
            id: ModuleId,
            conditions: &mut Vec<ImportCondition>,
            seen: &mut FxHashSet<ModuleId>,
            out: &mut Vec<(ModuleId, Vec<ImportCondition>)>,
        ) {
            if !seen.insert(id) {
                return;
            }
            for dep in &graph.module(id).dependencies {
                match &dep.dependency.kind {
                    DependencyKind::StyleImport { condition } if !condition.is_unconditional() => {
                        conditions.push(condition.clone());
                        visit(graph, dep.module, conditions, seen, out);
                        conditions.pop();
                    }
                    _ => visit(graph, dep.module, conditions, seen, out),
                }
            }
            out.push((id, conditions.clone()));
        }

        let mut conditions = Vec::new();
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for root in roots {
            visit(self, *root, &mut conditions, &mut seen, &mut out);
        }
        out
    }

    /// Replace the `url()` placeholders in a stylesheet of module `id` with
    /// the public URLs of the referenced modules.
    pub fn substitute_urls(&self, id: ModuleId, css: &str) -> Result<String> {
        let record = self.module(id);
        let mut css = css.to_string();
        for dep in &record.dependencies {
            let DependencyKind::StyleUrl { placeholder } = &dep.dependency.kind else {
                continue;
            };
            let target = self.module(dep.module);
            let url = target.exported_url.as_deref().ok_or_else(|| Error::Link {
                path: record.path.clone(),
                message: format!(
                    "url({}) points at {}, which does not export a URL",
                    dep.dependency.request,
                    target.path.display()
                ),
            })?;
            let mut replacement = url.to_string();
            if let Some(fragment) = &dep.fragment {
                replacement.push_str(fragment);
            }
            css = css.replace(placeholder.as_str(), &replacement);
        }
        Ok(css)
    }
}

/// Split `#fragment` off a stylesheet request. `font.eot?#iefix` keeps the
/// `?` with the fragment.
fn split_fragment(request: &str) -> (&str, Option<&str>) {
    let Some(hash) = request.find('#') else {
        return (request, None);
    };
    let (path, _) = request.split_at(hash);
    match path.strip_suffix('?') {
        Some(path) => (path, Some(&request[hash - 1..])),
        None => (path, Some(&request[hash..])),
    }
}

pub(crate) struct Compilation<'a> {
    env: &'a BuildEnv,
    rules: &'a RuleSet,
    runtime: &'a dyn Runtime,
    resolver: ModuleResolver,
    graph: ModuleGraph,
    assets: AssetMap,
    queue: VecDeque<ModuleId>,
}

impl<'a> Compilation<'a> {
    pub(crate) fn new(
        env: &'a BuildEnv,
        rules: &'a RuleSet,
        resolve: &ResolveOptions,
        runtime: &'a dyn Runtime,
    ) -> Self {
        Self {
            env,
            rules,
            runtime,
            resolver: ModuleResolver::new(resolve, VirtualModules::default()),
            graph: ModuleGraph::default(),
            assets: AssetMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Process every module reachable from `entries`.
    pub(crate) async fn run(mut self, entries: &EntryMap) -> Result<(ModuleGraph, AssetMap)> {
        for (name, source) in entries {
            let mut ids = Vec::new();
            for path in source.paths() {
                let resolved = self
                    .resolver
                    .resolve_entry(&self.env.context, path)
                    .map_err(|message| Error::Resolve {
                        request: path.display().to_string(),
                        from: self.env.context.clone(),
                        message,
                    })?;
                ids.push(self.add(resolved));
            }
            self.graph.entries.insert(name.clone(), ids);
        }

        while let Some(id) = self.queue.pop_front() {
            self.process(id).await?;
        }

        debug!(modules = self.graph.len(), "module graph complete");
        Ok((self.graph, self.assets))
    }

    fn add(&mut self, resolved: Resolved) -> ModuleId {
        let key = module_key(&resolved.path, resolved.query.as_deref());
        if let Some(id) = self.graph.by_key.get(&key) {
            return *id;
        }
        let id = ModuleId(self.graph.modules.len() as u32);
        trace!(%id, module = %key, "discovered");
        self.graph.modules.push(ModuleRecord {
            id,
            path: resolved.path,
            query: resolved.query,
            rule: None,
            output: Source::Raw(Vec::new()),
            extracted_css: None,
            exported_url: None,
            dependencies: Vec::new(),
        });
        self.graph.by_key.insert(key, id);
        self.queue.push_back(id);
        id
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        if let Some(content) = self.resolver.virtual_modules().get(path) {
            return Ok(content);
        }
        Ok(self.runtime.read_file(path).await?)
    }

    async fn process(&mut self, id: ModuleId) -> Result<()> {
        let env = self.env;
        let rules = self.rules;
        let (path, query) = {
            let record = self.graph.module(id);
            (record.path.clone(), record.query.clone())
        };
        let content = self.read(&path).await?;
        let subject = match_subject(&path, &env.context);

        let (rule, output, effects) = match rules.dispatch(&path, &subject)? {
            Dispatch::Rule(rule) => {
                debug!(module = %subject, rule = rule.index, "dispatch");
                let mut cx =
                    StageContext::new(&path, query.as_deref(), &content, env, self.runtime);
                let mut source = Source::Raw(content.clone());
                for bound in &rule.chain {
                    cx.options = &bound.options;
                    trace!(module = %subject, stage = %bound.name, input = source.kind(), "stage");
                    source = bound
                        .stage
                        .run(source, &mut cx)
                        .await
                        .map_err(|e| Error::stage(&bound.name, &path, e))?;
                }
                (Some(rule.index), source, cx.effects)
            }
            Dispatch::Native(kind) => {
                debug!(module = %subject, ?kind, "native");
                (None, native_output(&path, kind, content)?, StageEffects::default())
            }
        };

        let StageEffects {
            mut dependencies,
            assets,
            extracted_css,
            exported_url,
            url_roots,
            virtual_modules,
        } = effects;

        for (virtual_path, content) in virtual_modules {
            self.resolver.virtual_modules().insert(virtual_path, content);
        }
        for asset in assets {
            self.assets.insert(asset)?;
        }

        if let Source::Script(code) = &output {
            let requests = linker::scan_requests(&path, code).map_err(|e| Error::Link {
                path: path.clone(),
                message: format!("{e:#}"),
            })?;
            dependencies.extend(requests.into_iter().map(Dependency::script));
        }

        let dir = path.parent().unwrap_or(&env.context).to_path_buf();
        let mut resolved_deps = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let (request, fragment) = match dependency.kind {
                DependencyKind::StyleUrl { .. } => split_fragment(&dependency.request),
                _ => (dependency.request.as_str(), None),
            };
            let resolved = match dependency.kind {
                DependencyKind::StyleUrl { .. } => {
                    self.resolver.resolve_url(&dir, &url_roots, request)
                }
                _ => self.resolver.resolve(&dir, request),
            }
            .map_err(|message| Error::Resolve {
                request: dependency.request.clone(),
                from: path.clone(),
                message,
            })?;
            let fragment = fragment.map(str::to_string);
            let module = self.add(resolved);
            resolved_deps.push(ResolvedDependency {
                dependency,
                module,
                fragment,
            });
        }

        let record = &mut self.graph.modules[id.index()];
        record.rule = rule;
        record.output = output;
        record.extracted_css = extracted_css;
        record.exported_url = exported_url;
        record.dependencies = resolved_deps;
        Ok(())
    }
}

/// Output of a file handled without a rule.
fn native_output(path: &Path, kind: NativeKind, content: Vec<u8>) -> Result<Source> {
    let text = String::from_utf8(content).map_err(|_| Error::Link {
        path: path.to_path_buf(),
        message: "expected UTF-8 text".to_string(),
    })?;
    match kind {
        NativeKind::Script => Ok(Source::Script(text)),
        NativeKind::Json => {
            serde_json::from_str::<serde_json::Value>(&text).map_err(|e| Error::Link {
                path: path.to_path_buf(),
                message: format!("invalid JSON: {e}"),
            })?;
            Ok(Source::Script(format!("module.exports = {};", text.trim())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments() {
        assert_eq!(split_fragment("./a.svg#icon"), ("./a.svg", Some("#icon")));
        assert_eq!(
            split_fragment("./a.eot?#iefix"),
            ("./a.eot", Some("?#iefix"))
        );
        assert_eq!(split_fragment("./a.png"), ("./a.png", None));
    }

    #[test]
    fn relative_dir_has_trailing_slash() {
        let env = BuildEnv::from_descriptor(&Descriptor::default().with_context("/p"));
        assert_eq!(env.relative_dir(Path::new("/p/img/logo.png")), "img/");
        assert_eq!(env.relative_dir(Path::new("/p/logo.png")), "");
        assert_eq!(env.relative_dir(Path::new("/q/logo.png")), "");
    }

    #[test]
    fn json_becomes_a_module() {
        let out = native_output(
            Path::new("/p/data.json"),
            NativeKind::Json,
            br#"{"a": 1}"#.to_vec(),
        )
        .unwrap();
        assert_eq!(out, Source::Script(r#"module.exports = {"a": 1};"#.to_string()));
        assert!(native_output(Path::new("/p/bad.json"), NativeKind::Json, b"{".to_vec()).is_err());
    }
}
