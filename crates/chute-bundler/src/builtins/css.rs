//! Stylesheet processing through lightningcss.
//!
//! ```text
//! text → StyleSheet::parse → (minify) → to_css → text (+ dependencies)
//! ```

use std::path::Path;

use lightningcss::dependencies::{Dependency, DependencyOptions};
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::CssRule;
use lightningcss::rules::import::ImportRule;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;

use crate::module::ImportCondition;

/// A reference found in a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssReference {
    /// An `@import`, lifted out of the sheet. `rule` is the rule printed back
    /// as CSS, for imports that stay in the output.
    Import {
        url: String,
        condition: ImportCondition,
        rule: String,
    },
    /// A `url()`; the CSS text carries `placeholder` where it was.
    Url { url: String, placeholder: String },
}

impl CssReference {
    pub fn url(&self) -> &str {
        match self {
            CssReference::Import { url, .. } | CssReference::Url { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzedCss {
    /// The sheet without its `@import` rules.
    pub code: String,
    pub references: Vec<CssReference>,
}

/// Browser targets from browserslist queries. No queries means no targets.
pub fn browser_targets(queries: &[String]) -> anyhow::Result<Targets> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(queries)
        .map_err(|e| anyhow::anyhow!("invalid browserslist query: {e}"))?;
    Ok(browsers.map(Targets::from).unwrap_or_default())
}

fn parse<'i>(path: &Path, source: &'i str) -> anyhow::Result<StyleSheet<'i>> {
    StyleSheet::parse(
        source,
        ParserOptions {
            filename: path.to_string_lossy().to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| anyhow::anyhow!("Failed to parse CSS from {}: {e}", path.display()))
}

fn print_part<T: ToCss>(path: &Path, value: &T) -> anyhow::Result<String> {
    value
        .to_css_string(PrinterOptions::default())
        .map_err(|e| anyhow::anyhow!("Failed to print CSS from {}: {e}", path.display()))
}

/// Remove the top-level `@import` rules from `stylesheet`, in order.
fn take_imports<'i>(stylesheet: &mut StyleSheet<'i>) -> Vec<ImportRule<'i>> {
    let mut imports = Vec::new();
    stylesheet.rules.0.retain(|rule| match rule {
        CssRule::Import(import) => {
            imports.push(import.clone());
            false
        }
        _ => true,
    });
    imports
}

fn import_reference(path: &Path, import: &ImportRule<'_>) -> anyhow::Result<CssReference> {
    let layer = match &import.layer {
        None => None,
        Some(None) => Some(None),
        Some(Some(name)) => Some(Some(print_part(path, name)?)),
    };
    let supports = import
        .supports
        .as_ref()
        .map(|supports| print_part(path, supports))
        .transpose()?;
    let media = if import.media.media_queries.is_empty() {
        None
    } else {
        Some(print_part(path, &import.media)?)
    };

    Ok(CssReference::Import {
        url: import.url.to_string(),
        condition: ImportCondition {
            layer,
            supports,
            media,
        },
        rule: print_part(path, import)?,
    })
}

/// Parse, lower for `targets` and print unminified.
pub fn normalize(path: &Path, source: &str, targets: Targets) -> anyhow::Result<String> {
    let mut stylesheet = parse(path, source)?;
    stylesheet
        .minify(MinifyOptions {
            targets,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("Failed to process CSS from {}: {e}", path.display()))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            targets,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("Failed to print CSS from {}: {e}", path.display()))?;
    Ok(result.code)
}

/// Split `source` into its `@import` rules (with their conditions) and the
/// remaining sheet, whose `url()` references are replaced by placeholders.
pub fn analyze(path: &Path, source: &str) -> anyhow::Result<AnalyzedCss> {
    let mut stylesheet = parse(path, source)?;
    let mut references = take_imports(&mut stylesheet)
        .iter()
        .map(|import| import_reference(path, import))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let result = stylesheet
        .to_css(PrinterOptions {
            analyze_dependencies: Some(DependencyOptions {
                remove_imports: false,
            }),
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("Failed to print CSS from {}: {e}", path.display()))?;

    references.extend(
        result
            .dependencies
            .unwrap_or_default()
            .into_iter()
            .filter_map(|dependency| match dependency {
                Dependency::Url(url) => Some(CssReference::Url {
                    url: url.url,
                    placeholder: url.placeholder,
                }),
                _ => None,
            }),
    );

    Ok(AnalyzedCss {
        code: result.code,
        references,
    })
}

/// Separate the `@import` rules of a finished stylesheet from the rest, so
/// they can be moved to the top of a concatenated sheet.
pub fn split_imports(name: &str, source: &str) -> anyhow::Result<(Vec<String>, String)> {
    if !source.contains("@import") {
        return Ok((Vec::new(), source.to_string()));
    }
    let path = Path::new(name);
    let mut stylesheet = parse(path, source)?;
    let imports = take_imports(&mut stylesheet)
        .iter()
        .map(|import| print_part(path, import))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if imports.is_empty() {
        return Ok((imports, source.to_string()));
    }
    let rest = stylesheet
        .to_css(PrinterOptions::default())
        .map_err(|e| anyhow::anyhow!("Failed to print CSS {name}: {e}"))?;
    Ok((imports, rest.code))
}

/// Minify a finished stylesheet. License comments (`/*! ... */`) survive
/// unless `drop_comments`.
pub fn minify(name: &str, source: &str, drop_comments: bool) -> anyhow::Result<String> {
    let mut stylesheet = parse(Path::new(name), source)?;
    if drop_comments {
        stylesheet.license_comments.clear();
    }
    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| anyhow::anyhow!("Failed to minify CSS {name}: {e}"))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("Failed to print CSS {name}: {e}"))?;
    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_finds_imports_and_urls() {
        let css = r#"@import "./base.css"; .logo { background: url(./img/logo.png); }"#;
        let analyzed = analyze(Path::new("/p/main.css"), css).unwrap();

        assert_eq!(analyzed.references.len(), 2);
        assert!(matches!(
            &analyzed.references[0],
            CssReference::Import { url, condition, .. } if url == "./base.css" && condition.is_unconditional()
        ));
        let CssReference::Url { url, placeholder } = &analyzed.references[1] else {
            panic!("expected url reference");
        };
        assert_eq!(url, "./img/logo.png");
        assert!(analyzed.code.contains(placeholder.as_str()));
        assert!(!analyzed.code.contains("@import"));
    }

    #[test]
    fn import_conditions_are_kept() {
        let css = r#"@import "./print.css" layer(base) supports(display: grid) print;
@import url("https://fonts.example/css?family=Roboto");
.a { color: red; }"#;
        let analyzed = analyze(Path::new("/p/main.css"), css).unwrap();

        let CssReference::Import { condition, .. } = &analyzed.references[0] else {
            panic!("expected import reference");
        };
        assert_eq!(condition.layer, Some(Some("base".to_string())));
        assert_eq!(condition.supports.as_deref(), Some("(display: grid)"));
        assert_eq!(condition.media.as_deref(), Some("print"));

        let CssReference::Import { url, rule, .. } = &analyzed.references[1] else {
            panic!("expected import reference");
        };
        assert_eq!(url, "https://fonts.example/css?family=Roboto");
        assert!(rule.starts_with("@import "), "{rule}");
        assert!(rule.contains("fonts.example"), "{rule}");
        assert!(!analyzed.code.contains("@import"));
    }

    #[test]
    fn imports_split_from_the_rest() {
        let css = "@import \"https://fonts.example/a.css\";\n.a { color: red; }\n";
        let (imports, rest) = split_imports("app.css", css).unwrap();
        assert_eq!(imports.len(), 1);
        assert!(imports[0].contains("https://fonts.example/a.css"));
        assert!(rest.contains(".a"));
        assert!(!rest.contains("@import"));

        let (none, same) = split_imports("app.css", ".b{}").unwrap();
        assert!(none.is_empty());
        assert_eq!(same, ".b{}");
    }

    #[test]
    fn minify_drops_license_comments() {
        let css = "/*! keep me */\n.a {\n  color: red;\n}\n";
        let kept = minify("a.css", css, false).unwrap();
        assert!(kept.contains("keep me"));
        let dropped = minify("a.css", css, true).unwrap();
        assert_eq!(dropped, ".a{color:red}");
    }

    #[test]
    fn empty_queries_mean_no_targets() {
        assert!(browser_targets(&[]).unwrap().browsers.is_none());
        assert!(browser_targets(&["last 2 chrome versions".to_string()]).is_ok());
    }
}
