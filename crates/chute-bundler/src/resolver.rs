//! Module resolution on top of `oxc_resolver`, plus in-memory modules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chute_config::ResolveOptions;
use oxc_resolver::{AliasValue, ResolveOptions as OxcResolveOptions, Resolver};
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use tracing::trace;

/// Modules that exist only in memory (SFC blocks), keyed by absolute path.
#[derive(Debug, Clone, Default)]
pub struct VirtualModules {
    files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
}

impl VirtualModules {
    pub fn insert(&self, path: PathBuf, content: Vec<u8>) {
        self.files.write().insert(path.clean(), content);
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }
}

/// A resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    /// `?query`, including the `?`.
    pub query: Option<String>,
}

#[derive(Debug)]
pub struct ModuleResolver {
    inner: Resolver,
    virtual_modules: VirtualModules,
}

fn is_relative(request: &str) -> bool {
    request == "." || request == ".." || request.starts_with("./") || request.starts_with("../")
}

fn split_query(request: &str) -> (&str, Option<&str>) {
    match request.find('?') {
        Some(at) => (&request[..at], Some(&request[at..])),
        None => (request, None),
    }
}

impl ModuleResolver {
    pub fn new(options: &ResolveOptions, virtual_modules: VirtualModules) -> Self {
        let alias = options
            .alias
            .iter()
            .map(|(from, to)| (from.clone(), vec![AliasValue::Path(to.clone())]))
            .collect();

        // `*` means "the request as written", which oxc always tries first.
        let extensions = options
            .extensions
            .iter()
            .filter(|ext| ext.as_str() != "*" && !ext.is_empty())
            .cloned()
            .collect();

        let inner = Resolver::new(OxcResolveOptions {
            alias,
            extensions,
            modules: options.modules.clone(),
            main_fields: vec![
                "browser".to_string(),
                "module".to_string(),
                "main".to_string(),
            ],
            alias_fields: vec![vec!["browser".to_string()]],
            condition_names: vec![
                "browser".to_string(),
                "import".to_string(),
                "require".to_string(),
                "default".to_string(),
            ],
            ..OxcResolveOptions::default()
        });

        Self {
            inner,
            virtual_modules,
        }
    }

    pub fn virtual_modules(&self) -> &VirtualModules {
        &self.virtual_modules
    }

    /// Resolve `request` as seen from directory `from_dir`.
    pub fn resolve(&self, from_dir: &Path, request: &str) -> Result<Resolved, String> {
        if is_relative(request) {
            let (path, query) = split_query(request);
            let candidate = from_dir.join(path).clean();
            if self.virtual_modules.contains(&candidate) {
                trace!(request, path = %candidate.display(), "virtual module");
                return Ok(Resolved {
                    path: candidate,
                    query: query.map(str::to_string),
                });
            }
        }

        let resolution = self
            .inner
            .resolve(from_dir, request)
            .map_err(|e| e.to_string())?;
        Ok(Resolved {
            path: resolution.path().to_path_buf(),
            query: resolution.query().map(str::to_string),
        })
    }

    /// Resolve a stylesheet `url()` request: the importer's directory first,
    /// then each extra root in order.
    pub fn resolve_url(
        &self,
        from_dir: &Path,
        roots: &[PathBuf],
        request: &str,
    ) -> Result<Resolved, String> {
        match self.resolve(from_dir, request) {
            Ok(resolved) => Ok(resolved),
            Err(message) if !is_relative(request) => Err(message),
            Err(message) => roots
                .iter()
                .find_map(|root| self.resolve(root, request).ok())
                .ok_or(message),
        }
    }

    /// Resolve an entry path relative to `context`.
    pub fn resolve_entry(&self, context: &Path, entry: &Path) -> Result<Resolved, String> {
        if entry.is_absolute() {
            return self.resolve(
                entry.parent().unwrap_or(context),
                &format!("./{}", entry.file_name().unwrap_or_default().to_string_lossy()),
            );
        }
        let request = entry.to_string_lossy().replace('\\', "/");
        if is_relative(&request) {
            self.resolve(context, &request)
        } else {
            self.resolve(context, &format!("./{request}"))
        }
    }
}
