//! Script lowering and minification through oxc.

use std::path::Path;
use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::{Parser, ParserReturn};
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use regex::Regex;

/// Comments kept as license text: `/*!`, `@preserve`, `@license`, `@cc_on`.
static LICENSE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\**!|@preserve|@license|@cc_on").expect("license pattern is valid")
});

/// Source type from the file extension; anything unknown parses as an ES
/// module.
pub fn source_type(path: &Path) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs())
}

fn errors_to_anyhow<E: std::fmt::Display>(path: &Path, errors: &[E]) -> anyhow::Error {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    anyhow::anyhow!("{}: {}", path.display(), messages.join("; "))
}

/// Lower `source` to `target` (e.g. `es2015`) and print it.
pub fn lower(path: &Path, source: &str, target: &str) -> anyhow::Result<String> {
    let options = TransformOptions::from_target(target)
        .map_err(|e| anyhow::anyhow!("invalid target '{target}': {e}"))?;

    let allocator = Allocator::default();
    let ParserReturn {
        mut program,
        errors,
        ..
    } = Parser::new(&allocator, source, source_type(path)).parse();
    if !errors.is_empty() {
        return Err(errors_to_anyhow(path, &errors));
    }

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let ret = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        return Err(errors_to_anyhow(path, &ret.errors));
    }

    Ok(Codegen::new().build(&program).code)
}

#[derive(Debug, Clone, Copy)]
pub struct MinifySettings {
    pub mangle: bool,
    pub compress: bool,
    /// Keep license comments in the output instead of dropping them.
    pub keep_license_comments: bool,
}

impl Default for MinifySettings {
    fn default() -> Self {
        Self {
            mangle: true,
            compress: true,
            keep_license_comments: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifiedScript {
    pub code: String,
    /// License comments found in the input, in source order, with their
    /// comment delimiters.
    pub license_comments: Vec<String>,
}

/// Normalize a comment's source text to `/*...*/` or `//...` form and
/// return it with its body.
fn comment_parts(raw: &str, is_line: bool) -> (String, &str) {
    if let Some(body) = raw.strip_prefix("//") {
        return (raw.to_string(), body);
    }
    if let Some(body) = raw.strip_prefix("/*") {
        return (raw.to_string(), body.strip_suffix("*/").unwrap_or(body));
    }
    if is_line {
        (format!("//{raw}"), raw)
    } else {
        (format!("/*{raw}*/"), raw)
    }
}

pub fn minify(name: &str, source: &str, settings: MinifySettings) -> anyhow::Result<MinifiedScript> {
    let path = Path::new(name);
    let allocator = Allocator::default();
    let ParserReturn {
        mut program,
        errors,
        ..
    } = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if !errors.is_empty() {
        return Err(errors_to_anyhow(path, &errors));
    }

    let license_comments: Vec<String> = program
        .comments
        .iter()
        .filter_map(|comment| {
            let raw = comment.span.source_text(source);
            let (text, body) = comment_parts(raw, comment.is_line());
            LICENSE_COMMENT.is_match(body).then_some(text)
        })
        .collect();

    let ret = Minifier::new(MinifierOptions {
        mangle: settings.mangle.then(MangleOptions::default),
        compress: settings.compress.then(CompressOptions::default),
    })
    .minify(&allocator, &mut program);

    let mut code = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(ret.scoping)
        .build(&program)
        .code;

    if settings.keep_license_comments && !license_comments.is_empty() {
        code = format!("{}\n{code}", license_comments.join("\n"));
    }

    Ok(MinifiedScript {
        code,
        license_comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_object_spread() {
        let out = lower(
            Path::new("/p/src/app.js"),
            "const f = (a, ...rest) => ({ ...a, rest });",
            "es2015",
        )
        .unwrap();
        assert!(!out.contains("...a"), "{out}");
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = lower(Path::new("/p/broken.js"), "let = ;", "es2015").unwrap_err();
        assert!(err.to_string().contains("broken.js"));
    }

    #[test]
    fn license_comments_are_collected() {
        let src = "/*! lib v1 | MIT */\n// plain comment\nfunction add(first, second) { return first + second; }\nmodule.exports = add;\n";
        let out = minify("app.js", src, MinifySettings::default()).unwrap();
        assert_eq!(out.license_comments, vec!["/*! lib v1 | MIT */".to_string()]);
        assert!(!out.code.contains("plain comment"));
        assert!(out.code.len() < src.len());
    }
}
