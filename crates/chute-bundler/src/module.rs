//! Module records produced by the compilation.

use std::fmt;
use std::path::{Path, PathBuf};

/// Index of a module in the [`crate::ModuleGraph`]. Assigned in discovery
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What flows between stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// File content as read, before any stage ran.
    Raw(Vec<u8>),
    Script(String),
    Style(String),
}

impl Source {
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Raw(_) => "raw",
            Source::Script(_) => "script",
            Source::Style(_) => "style",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Source::Raw(bytes) => bytes,
            Source::Script(text) | Source::Style(text) => text.as_bytes(),
        }
    }

    /// Text content. Raw bytes must be UTF-8.
    pub fn into_text(self) -> anyhow::Result<String> {
        match self {
            Source::Raw(bytes) => String::from_utf8(bytes)
                .map_err(|_| anyhow::anyhow!("expected UTF-8 text, found binary content")),
            Source::Script(text) | Source::Style(text) => Ok(text),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Source::Raw(bytes) => bytes,
            Source::Script(text) | Source::Style(text) => text.into_bytes(),
        }
    }
}

/// How a module refers to another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyKind {
    /// `import`, `require()` or `import()` in a script.
    Script,
    /// `@import` in a stylesheet, with the conditions written after its URL.
    StyleImport { condition: ImportCondition },
    /// `url()` in a stylesheet; `placeholder` stands in the CSS text until
    /// the target's public URL is known.
    StyleUrl { placeholder: String },
}

/// `layer(...)`, `supports(...)` and media list of an `@import`.
///
/// The imported sheet only applies under these conditions, so extraction
/// wraps its rules in matching `@layer`, `@supports` and `@media` blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportCondition {
    /// `Some(None)` is an anonymous layer.
    pub layer: Option<Option<String>>,
    pub supports: Option<String>,
    pub media: Option<String>,
}

impl ImportCondition {
    pub fn is_unconditional(&self) -> bool {
        self.layer.is_none() && self.supports.is_none() && self.media.is_none()
    }

    /// Wrap `css` so it only applies under this condition. Media is the
    /// innermost block and the layer the outermost, matching the order the
    /// conditions are written in.
    pub fn wrap(&self, css: &str) -> String {
        let mut out = css.trim_end().to_string();
        if let Some(media) = &self.media {
            out = format!("@media {media} {{\n{out}\n}}");
        }
        if let Some(supports) = &self.supports {
            out = format!("@supports {supports} {{\n{out}\n}}");
        }
        match &self.layer {
            Some(Some(name)) => out = format!("@layer {name} {{\n{out}\n}}"),
            Some(None) => out = format!("@layer {{\n{out}\n}}"),
            None => {}
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub request: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn script(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            kind: DependencyKind::Script,
        }
    }

    pub fn is_style(&self) -> bool {
        !matches!(self.kind, DependencyKind::Script)
    }
}

/// A dependency after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub dependency: Dependency,
    pub module: ModuleId,
    /// `#fragment` of the request, kept for `url()` substitution.
    pub fragment: Option<String>,
}

/// One processed module.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    /// Absolute path without query.
    pub path: PathBuf,
    /// `?query` part of the request, including the `?`.
    pub query: Option<String>,
    /// Index of the rule that handled the module; `None` for natively
    /// understood files.
    pub rule: Option<usize>,
    /// Output of the last stage.
    pub output: Source,
    /// Stylesheet moved out of the script by `css-extract-loader`.
    pub extracted_css: Option<String>,
    /// Public URL exported by `file-loader` / `url-loader`.
    pub exported_url: Option<String>,
    pub dependencies: Vec<ResolvedDependency>,
}

impl ModuleRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key used to deduplicate modules: path plus query.
    pub fn key(&self) -> String {
        module_key(&self.path, self.query.as_deref())
    }

    pub fn script_dependencies(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies
            .iter()
            .filter(|d| !d.dependency.is_style())
    }
}

pub(crate) fn module_key(path: &Path, query: Option<&str>) -> String {
    let mut key = path.to_string_lossy().replace('\\', "/");
    if let Some(query) = query {
        key.push_str(query);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_nest_layer_supports_media() {
        let condition = ImportCondition {
            layer: Some(Some("base".to_string())),
            supports: Some("(display: grid)".to_string()),
            media: Some("print".to_string()),
        };
        assert_eq!(
            condition.wrap(".p{color:blue}\n"),
            "@layer base {\n@supports (display: grid) {\n@media print {\n.p{color:blue}\n}\n}\n}"
        );
        assert_eq!(ImportCondition::default().wrap(".p{}\n"), ".p{}");
        assert!(ImportCondition::default().is_unconditional());
    }
}
