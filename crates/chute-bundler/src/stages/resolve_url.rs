use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use chute_config::preset::stage;
use regex::Regex;
use rustc_hash::FxHashSet;
use tracing::trace;

use super::{Stage, StageContext};
use crate::module::Source;
use crate::runtime::Runtime;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@import[ \t]+([^;\n]+)").expect("import pattern is valid")
});

const PARTIAL_EXTENSIONS: &[&str] = &["sass", "scss", "css"];

/// `@import` targets of a Sass source. Both syntaxes allow a comma separated
/// list; plain CSS imports (`url(...)`, remote URLs) are skipped.
fn import_requests(source: &str) -> Vec<String> {
    IMPORT
        .captures_iter(source)
        .flat_map(|caps| {
            caps[1]
                .split(',')
                .map(|part| part.trim().trim_matches(['"', '\'']).to_string())
                .collect::<Vec<_>>()
        })
        .filter(|request| {
            !request.is_empty()
                && !request.starts_with("url(")
                && !request.contains("://")
                && !request.starts_with("//")
        })
        .collect()
}

/// Files a Sass import of `request` from `dir` may refer to, in lookup order.
fn partial_candidates(dir: &Path, request: &str) -> Vec<PathBuf> {
    let request = Path::new(request);
    let parent = dir.join(request.parent().unwrap_or_else(|| Path::new("")));
    let Some(stem) = request.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Vec::new();
    };

    if request.extension().is_some_and(|ext| {
        PARTIAL_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    }) {
        return vec![parent.join(format!("_{stem}")), parent.join(&stem)];
    }

    PARTIAL_EXTENSIONS
        .iter()
        .flat_map(|ext| {
            [
                parent.join(format!("_{stem}.{ext}")),
                parent.join(format!("{stem}.{ext}")),
            ]
        })
        .collect()
}

fn find_partial(runtime: &dyn Runtime, dir: &Path, request: &str) -> Option<PathBuf> {
    partial_candidates(dir, request)
        .into_iter()
        .find(|candidate| runtime.exists(candidate))
}

/// Makes `url()` references inside imported partials resolvable relative to
/// the partial that wrote them.
///
/// Compiled Sass has lost track of which partial a rule came from, so the
/// directories of every partial reachable through `@import` become extra
/// roots that relative `url()` requests fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveUrlStage;

#[async_trait]
impl Stage for ResolveUrlStage {
    fn name(&self) -> &str {
        stage::RESOLVE_URL
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let css = match input {
            Source::Style(css) => css,
            other => anyhow::bail!("expected a stylesheet, got {} input", other.kind()),
        };

        let original = String::from_utf8_lossy(cx.original).into_owned();
        let mut pending = vec![(cx.resource_dir().to_path_buf(), original)];
        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
        seen.insert(cx.resource.to_path_buf());

        while let Some((dir, source)) = pending.pop() {
            for request in import_requests(&source) {
                let Some(partial) = find_partial(cx.runtime, &dir, &request) else {
                    trace!(request, "import not found on disk, left to the compiler");
                    continue;
                };
                if !seen.insert(partial.clone()) {
                    continue;
                }
                let partial_dir = partial.parent().unwrap_or(&dir).to_path_buf();
                if partial_dir != cx.resource_dir() {
                    cx.add_url_root(partial_dir.clone());
                }
                let bytes = cx.runtime.read_file(&partial).await?;
                pending.push((partial_dir, String::from_utf8_lossy(&bytes).into_owned()));
            }
        }

        Ok(Source::Style(css))
    }
}
