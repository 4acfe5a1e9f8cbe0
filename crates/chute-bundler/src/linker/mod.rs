//! Script linking.
//!
//! Each module becomes a function keyed by its [`ModuleId`]; `import`,
//! `export`, `require()` and `import()` are rewritten against a small
//! loader so the modules of one build target can be concatenated into a
//! single file.
//!
//! ```text
//! import Vue from "vue";      →  var __chute_m0__ = __chute_require__.n(__chute_require__(3));
//!                                var Vue = __chute_m0__["default"];
//! export const answer = 42;   →  __chute_require__.d(exports, { "answer": function () { return answer; } });
//!                                const answer = 42;
//! ```

mod prelude;
mod syntax;

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::compilation::{BuildEnv, ModuleGraph};
use crate::module::{ModuleId, Source};
use crate::stages::js_string;
use crate::{Error, Result};

use prelude::REQUIRE;
use syntax::{ImportBinding, Item};

const DEFAULT_BINDING: &str = "__chute_default__";

/// Requests made by a script, in first-seen order.
pub fn scan_requests(path: &Path, code: &str) -> anyhow::Result<Vec<String>> {
    Ok(syntax::analyze(path, code)?.requests())
}

struct Edit {
    start: u32,
    end: u32,
    text: String,
}

fn require_call(id: ModuleId) -> String {
    format!("{REQUIRE}({id})")
}

fn getter(expression: &str) -> String {
    format!("function () {{ return {expression}; }}")
}

/// Rewrite one script module against the loader. `lookup` maps a request
/// to the module it resolved to.
pub(crate) fn rewrite_module(
    path: &Path,
    code: &str,
    lookup: &dyn Fn(&str) -> Option<ModuleId>,
    node_env: Option<&str>,
) -> anyhow::Result<String> {
    let syntax = syntax::analyze(path, code)?;

    let resolve = |request: &str| {
        lookup(request).ok_or_else(|| anyhow::anyhow!("request '{request}' was not resolved"))
    };

    let mut edits: Vec<Edit> = Vec::new();
    let mut getters: Vec<(String, String)> = Vec::new();
    let mut namespaces = 0usize;
    let mut next_namespace = || {
        let name = format!("__chute_m{namespaces}__");
        namespaces += 1;
        name
    };

    for item in &syntax.items {
        match item {
            Item::Import {
                span,
                request,
                bindings,
            } => {
                let id = resolve(request)?;
                let text = if bindings.is_empty() {
                    format!("{};", require_call(id))
                } else {
                    let ns = next_namespace();
                    let mut text = format!("var {ns} = {REQUIRE}.n({});", require_call(id));
                    for binding in bindings {
                        text.push_str(&match binding {
                            ImportBinding::Default(local) => {
                                format!(" var {local} = {ns}[\"default\"];")
                            }
                            ImportBinding::Named { imported, local } => {
                                format!(" var {local} = {ns}[{}];", js_string(imported))
                            }
                            ImportBinding::Namespace(local) => format!(" var {local} = {ns};"),
                        });
                    }
                    text
                };
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text,
                });
            }
            Item::ExportDeclaration { prefix, names } => {
                edits.push(Edit {
                    start: prefix.start,
                    end: prefix.end,
                    text: String::new(),
                });
                getters.extend(names.iter().map(|n| (n.clone(), n.clone())));
            }
            Item::ExportDefaultExpression { prefix } => {
                edits.push(Edit {
                    start: prefix.start,
                    end: prefix.end,
                    text: format!("var {DEFAULT_BINDING} = "),
                });
                getters.push(("default".to_string(), DEFAULT_BINDING.to_string()));
            }
            Item::ExportDefaultNamed { prefix, name } => {
                edits.push(Edit {
                    start: prefix.start,
                    end: prefix.end,
                    text: String::new(),
                });
                getters.push(("default".to_string(), name.clone()));
            }
            Item::ExportDefaultAnonymous { prefix, end } => {
                edits.push(Edit {
                    start: prefix.start,
                    end: prefix.end,
                    text: format!("var {DEFAULT_BINDING} = "),
                });
                edits.push(Edit {
                    start: *end,
                    end: *end,
                    text: ";".to_string(),
                });
                getters.push(("default".to_string(), DEFAULT_BINDING.to_string()));
            }
            Item::ExportLocal { span, specifiers } => {
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text: String::new(),
                });
                getters.extend(
                    specifiers
                        .iter()
                        .map(|(local, exported)| (exported.clone(), local.clone())),
                );
            }
            Item::ExportFrom {
                span,
                request,
                specifiers,
            } => {
                let id = resolve(request)?;
                let ns = next_namespace();
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text: format!("var {ns} = {REQUIRE}.n({});", require_call(id)),
                });
                getters.extend(specifiers.iter().map(|(imported, exported)| {
                    (exported.clone(), format!("{ns}[{}]", js_string(imported)))
                }));
            }
            Item::ExportAll {
                span,
                request,
                alias,
            } => {
                let id = resolve(request)?;
                let text = match alias {
                    Some(alias) => {
                        let ns = next_namespace();
                        getters.push((alias.clone(), ns.clone()));
                        format!("var {ns} = {REQUIRE}.n({});", require_call(id))
                    }
                    None => format!("{REQUIRE}.x(exports, {});", require_call(id)),
                };
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text,
                });
            }
            Item::Require { span, request } => {
                let id = resolve(request)?;
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text: require_call(id),
                });
            }
            Item::DynamicImport { span, request } => {
                let id = resolve(request)?;
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text: format!(
                        "Promise.resolve().then(function () {{ return {REQUIRE}.n({}); }})",
                        require_call(id)
                    ),
                });
            }
            Item::NodeEnv { span } => {
                if let Some(value) = node_env {
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: js_string(value),
                    });
                }
            }
        }
    }

    let mut out = String::with_capacity(code.len() + 256);
    if syntax.is_esm {
        out.push_str(&format!("{REQUIRE}.r(exports);\n"));
    }
    if !getters.is_empty() {
        let entries: Vec<String> = getters
            .iter()
            .map(|(name, expression)| format!("{}: {}", js_string(name), getter(expression)))
            .collect();
        out.push_str(&format!("{REQUIRE}.d(exports, {{ {} }});\n", entries.join(", ")));
    }

    edits.sort_by_key(|e| (e.start, e.end));
    let mut cursor = 0usize;
    for edit in edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start < cursor {
            anyhow::bail!("overlapping rewrites at byte {start}");
        }
        out.push_str(&code[cursor..start]);
        out.push_str(&edit.text);
        cursor = end;
    }
    out.push_str(&code[cursor..]);
    Ok(out)
}

/// Body of one module function.
fn module_body(graph: &ModuleGraph, env: &BuildEnv, id: ModuleId) -> Result<String> {
    let record = graph.module(id);
    let link_error = |message: String| Error::Link {
        path: record.path.clone(),
        message,
    };

    match &record.output {
        Source::Script(code) => {
            let requests: FxHashMap<&str, ModuleId> = record
                .script_dependencies()
                .map(|dep| (dep.dependency.request.as_str(), dep.module))
                .collect();
            let lookup = |request: &str| requests.get(request).copied();
            rewrite_module(&record.path, code, &lookup, env.mode.node_env())
                .map_err(|e| link_error(format!("{e:#}")))
        }
        Source::Style(css) => {
            let css = graph.substitute_urls(id, css)?;
            Ok(format!("module.exports = {};\n", js_string(&css)))
        }
        Source::Raw(_) => Err(link_error(
            "the stage chain ended with raw content; its last stage must produce a script or a stylesheet"
                .to_string(),
        )),
    }
}

/// Link the script of one build target.
pub(crate) fn link_entry(graph: &ModuleGraph, env: &BuildEnv, roots: &[ModuleId]) -> Result<String> {
    let modules = graph
        .script_closure(roots)
        .into_iter()
        .map(|id| Ok((id, module_body(graph, env, id)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(prelude::bundle(&modules, roots))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(code: &str, node_env: Option<&str>) -> String {
        let lookup = |request: &str| match request {
            "vue" => Some(ModuleId(3)),
            "./util" => Some(ModuleId(4)),
            "./lazy" => Some(ModuleId(5)),
            _ => None,
        };
        rewrite_module(Path::new("/p/a.js"), code, &lookup, node_env).unwrap()
    }

    #[test]
    fn imports_and_exports() {
        let out = rewrite(
            "import Vue, { nextTick as tick } from 'vue';\nexport const answer = 42;\nexport default Vue;\n",
            None,
        );
        assert!(out.starts_with("__chute_require__.r(exports);\n"));
        assert!(out.contains(r#""answer": function () { return answer; }"#));
        assert!(out.contains(r#""default": function () { return __chute_default__; }"#));
        assert!(out.contains("var __chute_m0__ = __chute_require__.n(__chute_require__(3));"));
        assert!(out.contains(r#"var Vue = __chute_m0__["default"];"#));
        assert!(out.contains(r#"var tick = __chute_m0__["nextTick"];"#));
        assert!(out.contains("\nconst answer = 42;"));
        assert!(out.contains("var __chute_default__ = Vue;"));
        assert!(!out.contains("import "));
    }

    #[test]
    fn commonjs_and_dynamic_import() {
        let out = rewrite(
            "var util = require('./util');\nimport('./lazy').then(run);\nif (process.env.NODE_ENV === 'production') util();\n",
            Some("production"),
        );
        assert!(!out.contains("__esModule"));
        assert!(out.contains("var util = __chute_require__(4);"));
        assert!(out.contains(
            "Promise.resolve().then(function () { return __chute_require__.n(__chute_require__(5)); })"
        ));
        assert!(out.contains(r#"if ("production" === 'production')"#));
    }

    #[test]
    fn reexports() {
        let out = rewrite("export * from './util';\nexport { a as b } from 'vue';\n", None);
        assert!(out.contains("__chute_require__.x(exports, __chute_require__(4));"));
        assert!(out.contains(r#""b": function () { return __chute_m0__["a"]; }"#));
    }

    #[test]
    fn anonymous_default_function() {
        let out = rewrite("export default function () { return 1; }\n", None);
        assert!(out.contains("var __chute_default__ = function () { return 1; };"));
    }

    #[test]
    fn unresolved_request_is_an_error() {
        let lookup = |_: &str| None;
        let err = rewrite_module(Path::new("/p/a.js"), "require('./gone');", &lookup, None)
            .unwrap_err();
        assert!(err.to_string().contains("./gone"));
    }
}
