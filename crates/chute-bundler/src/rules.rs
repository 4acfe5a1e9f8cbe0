//! Compiled dispatch rules.
//!
//! Rules stay an ordered list scanned front to back; the first rule whose
//! predicate accepts a path owns the file. There is no fallthrough and no
//! merging of chains.

use std::path::Path;
use std::sync::Arc;

use chute_config::{ResolveLoaderOptions, Rule};
use regex::Regex;
use serde_json::Value;

use crate::stages::{Stage, StageRegistry};
use crate::{Error, Result};

/// A stage bound to the options declared next to it in the rule.
#[derive(Clone)]
pub struct BoundStage {
    pub name: String,
    pub stage: Arc<dyn Stage>,
    pub options: Value,
}

impl std::fmt::Debug for BoundStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundStage")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub index: usize,
    pub test: Regex,
    pub include: Option<Regex>,
    pub exclude: Option<Regex>,
    /// Stages in execution order.
    pub chain: Vec<BoundStage>,
}

impl CompiledRule {
    pub fn accepts(&self, subject: &str) -> bool {
        self.test.is_match(subject)
            && self.include.as_ref().is_none_or(|re| re.is_match(subject))
            && !self.exclude.as_ref().is_some_and(|re| re.is_match(subject))
    }
}

/// File types handled without a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Script,
    Json,
}

impl NativeKind {
    pub fn detect(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs") => Some(NativeKind::Script),
            Some("json") => Some(NativeKind::Json),
            _ => None,
        }
    }
}

/// Outcome of dispatching one path.
#[derive(Debug, Clone, Copy)]
pub enum Dispatch<'a> {
    Rule(&'a CompiledRule),
    Native(NativeKind),
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

fn compile_pattern(pattern: &str, rule: usize, field: &'static str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        rule,
        field,
        source,
    })
}

impl RuleSet {
    /// Compile rule patterns and look up every stage. Any failure here is a
    /// configuration error.
    pub fn compile(
        rules: &[Rule],
        registry: &StageRegistry,
        loader_options: &ResolveLoaderOptions,
    ) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());

        for (index, rule) in rules.iter().enumerate() {
            let test = compile_pattern(&rule.test, index, "test")?;
            let include = rule
                .include
                .as_deref()
                .map(|p| compile_pattern(p, index, "include"))
                .transpose()?;
            let exclude = rule
                .exclude
                .as_deref()
                .map(|p| compile_pattern(p, index, "exclude"))
                .transpose()?;

            let mut chain = Vec::with_capacity(rule.stages.len());
            for stage_ref in &rule.stages {
                let (name, stage) = registry
                    .lookup(&stage_ref.loader, loader_options)
                    .ok_or_else(|| Error::UnknownStage {
                        name: stage_ref.loader.clone(),
                        rule: index,
                    })?;
                stage
                    .validate(&stage_ref.options)
                    .map_err(|e| Error::StageOptions {
                        stage: name.clone(),
                        message: format!("{e:#}"),
                    })?;
                chain.push(BoundStage {
                    name,
                    stage,
                    options: stage_ref.options.clone(),
                });
            }

            compiled.push(CompiledRule {
                index,
                test,
                include,
                exclude,
                chain,
            });
        }

        Ok(Self { rules: compiled })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// First rule accepting `subject`.
    pub fn select(&self, subject: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.accepts(subject))
    }

    /// Dispatch `path`, matching against `subject` (see [`match_subject`]).
    pub fn dispatch(&self, path: &Path, subject: &str) -> Result<Dispatch<'_>> {
        if let Some(rule) = self.select(subject) {
            return Ok(Dispatch::Rule(rule));
        }
        NativeKind::detect(path)
            .map(Dispatch::Native)
            .ok_or_else(|| Error::NoMatchingRule(path.to_path_buf()))
    }
}

/// String rules are matched against: the path relative to `context` when it
/// lies inside it, the absolute path otherwise, with forward slashes.
pub fn match_subject(path: &Path, context: &Path) -> String {
    let shown = path.strip_prefix(context).unwrap_or(path);
    shown.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chute_config::{Descriptor, StageRef};

    fn production() -> RuleSet {
        let d = Descriptor::production();
        RuleSet::compile(
            &d.module.rules,
            &StageRegistry::builtin(),
            &d.resolve_loader,
        )
        .unwrap()
    }

    fn owner(set: &RuleSet, subject: &str) -> Option<usize> {
        set.select(subject).map(|r| r.index)
    }

    #[test]
    fn first_match_wins() {
        let set = production();
        assert_eq!(owner(&set, "src/app.js"), Some(1));
        assert_eq!(owner(&set, "src/App.vue"), Some(0));
        assert_eq!(owner(&set, "src/main.sass"), Some(2));
        assert_eq!(owner(&set, "src/main.css"), Some(3));
        assert_eq!(owner(&set, "fonts/icons.eot?v=4.7.0"), Some(4));
        assert_eq!(owner(&set, "fonts/icons.woff2"), Some(5));
        assert_eq!(owner(&set, "fonts/icons.svg"), Some(7));
        assert_eq!(owner(&set, "img/logo.png"), Some(10));
        assert_eq!(owner(&set, "blocks/card/card.mustache"), Some(11));
    }

    #[test]
    fn exclusions() {
        let set = production();
        assert_eq!(owner(&set, "node_modules/lib/index.js"), None);
        assert_eq!(owner(&set, "bower_components/x/a.gif"), None);
        // fonts have no exclusion
        assert_eq!(owner(&set, "node_modules/font/a.woff"), Some(5));
    }

    #[test]
    fn native_fallback_and_hard_error() {
        let set = production();
        let vendor = Path::new("/p/node_modules/lib/index.js");
        assert!(matches!(
            set.dispatch(vendor, "node_modules/lib/index.js").unwrap(),
            Dispatch::Native(NativeKind::Script)
        ));
        let notes = Path::new("/p/notes.txt");
        assert!(matches!(
            set.dispatch(notes, "notes.txt"),
            Err(Error::NoMatchingRule(_))
        ));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let rule = Rule::new("(unclosed").stage("file-loader");
        let err = RuleSet::compile(
            &[rule],
            &StageRegistry::builtin(),
            &ResolveLoaderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { rule: 0, field: "test", .. }));
    }

    #[test]
    fn unknown_stage_and_short_names() {
        let registry = StageRegistry::builtin();
        let loader = ResolveLoaderOptions::default();

        let short = Rule::new(r"\.css$").stage("postcss").stage("css");
        let set = RuleSet::compile(&[short], &registry, &loader).unwrap();
        let names: Vec<_> = set.rules()[0].chain.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["postcss-loader", "css-loader"]);

        let unknown = Rule::new(r"\.ts$").stage("ts-loader");
        let err = RuleSet::compile(&[unknown], &registry, &loader).unwrap_err();
        assert!(matches!(err, Error::UnknownStage { ref name, .. } if name == "ts-loader"));
    }

    #[test]
    fn malformed_stage_options() {
        let rule = Rule::new(r"\.png$").stage(StageRef::with_options(
            "url-loader",
            serde_json::json!({ "limit": "lots" }),
        ));
        let err = RuleSet::compile(
            &[rule],
            &StageRegistry::builtin(),
            &ResolveLoaderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::StageOptions { .. }));
    }

    #[test]
    fn subject_is_context_relative() {
        assert_eq!(
            match_subject(Path::new("/srv/site/src/app.js"), Path::new("/srv/site")),
            "src/app.js"
        );
        assert_eq!(
            match_subject(Path::new("/elsewhere/a.js"), Path::new("/srv/site")),
            "/elsewhere/a.js"
        );
    }
}
