//! Collects the module syntax the linker rewrites: import/export
//! statements, `require()` and `import()` calls with literal requests, and
//! `process.env.NODE_ENV`.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Declaration, ExportDefaultDeclarationKind, Expression,
    ImportDeclarationSpecifier, Statement, StaticMemberExpression,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImportBinding {
    Default(String),
    Named { imported: String, local: String },
    Namespace(String),
}

/// One piece of module syntax, with the span it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Item {
    Import {
        span: Span,
        request: String,
        bindings: Vec<ImportBinding>,
    },
    /// `export <declaration>`; `prefix` covers `export `.
    ExportDeclaration { prefix: Span, names: Vec<String> },
    /// `export default <expression>`.
    ExportDefaultExpression { prefix: Span },
    /// `export default function name() {}` / `class name {}`.
    ExportDefaultNamed { prefix: Span, name: String },
    /// `export default function () {}` / `class {}`; `end` is where the
    /// declaration ends.
    ExportDefaultAnonymous { prefix: Span, end: u32 },
    /// `export { local as exported }`.
    ExportLocal {
        span: Span,
        specifiers: Vec<(String, String)>,
    },
    /// `export { imported as exported } from "request"`.
    ExportFrom {
        span: Span,
        request: String,
        specifiers: Vec<(String, String)>,
    },
    /// `export * from "request"` / `export * as alias from "request"`.
    ExportAll {
        span: Span,
        request: String,
        alias: Option<String>,
    },
    Require { span: Span, request: String },
    DynamicImport { span: Span, request: String },
    NodeEnv { span: Span },
}

impl Item {
    pub(crate) fn request(&self) -> Option<&str> {
        match self {
            Item::Import { request, .. }
            | Item::ExportFrom { request, .. }
            | Item::ExportAll { request, .. }
            | Item::Require { request, .. }
            | Item::DynamicImport { request, .. } => Some(request),
            _ => None,
        }
    }

    fn start(&self) -> u32 {
        match self {
            Item::Import { span, .. }
            | Item::ExportLocal { span, .. }
            | Item::ExportFrom { span, .. }
            | Item::ExportAll { span, .. }
            | Item::Require { span, .. }
            | Item::DynamicImport { span, .. }
            | Item::NodeEnv { span } => span.start,
            Item::ExportDeclaration { prefix, .. }
            | Item::ExportDefaultExpression { prefix }
            | Item::ExportDefaultNamed { prefix, .. }
            | Item::ExportDefaultAnonymous { prefix, .. } => prefix.start,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ModuleSyntax {
    /// Uses `import` or `export` statements.
    pub is_esm: bool,
    /// In source order.
    pub items: Vec<Item>,
}

impl ModuleSyntax {
    /// Distinct requests in first-seen order.
    pub(crate) fn requests(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for request in self.items.iter().filter_map(Item::request) {
            if !out.iter().any(|r| r == request) {
                out.push(request.to_string());
            }
        }
        out
    }
}

/// Parse `code` as an ES module, falling back to a classic script.
pub(crate) fn analyze(path: &Path, code: &str) -> anyhow::Result<ModuleSyntax> {
    let allocator = Allocator::default();
    let mut ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        let script = Parser::new(&allocator, code, SourceType::cjs()).parse();
        if !script.errors.is_empty() {
            let messages: Vec<String> = ret.errors.iter().map(ToString::to_string).collect();
            anyhow::bail!("{}: {}", path.display(), messages.join("; "));
        }
        ret = script;
    }

    let mut collector = Collector::default();
    for statement in &ret.program.body {
        collector.statement(statement);
    }
    collector.visit_program(&ret.program);

    let mut items = collector.items;
    items.sort_by_key(Item::start);
    Ok(ModuleSyntax {
        is_esm: collector.is_esm,
        items,
    })
}

#[derive(Default)]
struct Collector {
    is_esm: bool,
    items: Vec<Item>,
}

fn declaration_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(function) => {
            function.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn string_argument<'b>(call: &'b CallExpression<'_>) -> Option<&'b str> {
    if call.arguments.len() != 1 {
        return None;
    }
    match &call.arguments[0] {
        Argument::StringLiteral(lit) => Some(lit.value.as_str()),
        _ => None,
    }
}

fn is_node_env(member: &StaticMemberExpression<'_>) -> bool {
    if member.property.name.as_str() != "NODE_ENV" {
        return false;
    }
    let Expression::StaticMemberExpression(env) = &member.object else {
        return false;
    };
    env.property.name.as_str() == "env"
        && matches!(&env.object, Expression::Identifier(id) if id.name.as_str() == "process")
}

impl Collector {
    fn statement(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::ImportDeclaration(decl) => {
                self.is_esm = true;
                let bindings = decl
                    .specifiers
                    .iter()
                    .flatten()
                    .map(|specifier| match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => ImportBinding::Named {
                            imported: s.imported.name().to_string(),
                            local: s.local.name.to_string(),
                        },
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            ImportBinding::Default(s.local.name.to_string())
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            ImportBinding::Namespace(s.local.name.to_string())
                        }
                    })
                    .collect();
                self.items.push(Item::Import {
                    span: decl.span,
                    request: decl.source.value.to_string(),
                    bindings,
                });
            }
            Statement::ExportNamedDeclaration(decl) => {
                self.is_esm = true;
                if let Some(declaration) = &decl.declaration {
                    self.items.push(Item::ExportDeclaration {
                        prefix: Span::new(decl.span.start, declaration.span().start),
                        names: declaration_names(declaration),
                    });
                    return;
                }
                let specifiers = decl
                    .specifiers
                    .iter()
                    .map(|s| (s.local.name().to_string(), s.exported.name().to_string()))
                    .collect();
                match &decl.source {
                    Some(source) => self.items.push(Item::ExportFrom {
                        span: decl.span,
                        request: source.value.to_string(),
                        specifiers,
                    }),
                    None => self.items.push(Item::ExportLocal {
                        span: decl.span,
                        specifiers,
                    }),
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                self.is_esm = true;
                let declaration_span = decl.declaration.span();
                let prefix = Span::new(decl.span.start, declaration_span.start);
                let id = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                        Some(function.id.as_ref().map(|id| id.name.to_string()))
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        Some(class.id.as_ref().map(|id| id.name.to_string()))
                    }
                    _ => None,
                };
                self.items.push(match id {
                    Some(Some(name)) => Item::ExportDefaultNamed { prefix, name },
                    Some(None) => Item::ExportDefaultAnonymous {
                        prefix,
                        end: declaration_span.end,
                    },
                    None => Item::ExportDefaultExpression { prefix },
                });
            }
            Statement::ExportAllDeclaration(decl) => {
                self.is_esm = true;
                self.items.push(Item::ExportAll {
                    span: decl.span,
                    request: decl.source.value.to_string(),
                    alias: decl.exported.as_ref().map(|e| e.name().to_string()),
                });
            }
            _ => {}
        }
    }
}

impl<'a> Visit<'a> for Collector {
    fn visit_expression(&mut self, expr: &Expression<'a>) {
        match expr {
            Expression::CallExpression(call) => {
                let is_require =
                    matches!(&call.callee, Expression::Identifier(id) if id.name.as_str() == "require");
                if let Some(request) = string_argument(call).filter(|_| is_require) {
                    self.items.push(Item::Require {
                        span: call.span,
                        request: request.to_string(),
                    });
                    return;
                }
            }
            Expression::ImportExpression(import) => {
                if let Expression::StringLiteral(lit) = &import.source {
                    self.items.push(Item::DynamicImport {
                        span: import.span,
                        request: lit.value.to_string(),
                    });
                    return;
                }
            }
            Expression::StaticMemberExpression(member) if is_node_env(member) => {
                self.items.push(Item::NodeEnv { span: member.span });
                return;
            }
            _ => {}
        }
        walk::walk_expression(self, expr);
    }
}
