use async_trait::async_trait;
use chute_config::preset::stage;
use serde::Deserialize;
use tracing::trace;

use super::{Stage, StageContext};
use crate::builtins::css::{self, CssReference};
use crate::module::{Dependency, DependencyKind, Source};

#[derive(Debug, Deserialize)]
struct CssOptions {
    /// Follow `url()` references.
    #[serde(default = "enabled")]
    url: bool,
    /// Follow `@import` rules.
    #[serde(default = "enabled")]
    import: bool,
}

fn enabled() -> bool {
    true
}

impl Default for CssOptions {
    fn default() -> Self {
        Self {
            url: true,
            import: true,
        }
    }
}

/// URLs that are left in the stylesheet as written.
fn is_external(url: &str) -> bool {
    url.is_empty()
        || url.starts_with('#')
        || url.starts_with('/')
        || url.starts_with("data:")
        || url
            .split_once(':')
            .is_some_and(|(scheme, _)| {
                !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            })
}

/// Module request for a stylesheet URL: `~pkg/x` names a package, anything
/// else is relative to the stylesheet.
fn module_request(url: &str) -> String {
    if let Some(package) = url.strip_prefix('~') {
        return package.to_string();
    }
    if url.starts_with("./") || url.starts_with("../") {
        url.to_string()
    } else {
        format!("./{url}")
    }
}

/// Turns `@import` and `url()` references into module dependencies.
///
/// Each followed `url()` is left as a placeholder in the text; the
/// placeholder is swapped for the target's public URL once the graph is
/// complete. Followed imports leave the text and carry their conditions on
/// the dependency. Imports that are not followed (remote sheets, or all of
/// them with `import: false`) stay at the top of the sheet as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssStage;

#[async_trait]
impl Stage for CssStage {
    fn name(&self) -> &str {
        stage::CSS
    }

    fn validate(&self, options: &serde_json::Value) -> anyhow::Result<()> {
        super::parse_options::<CssOptions>(options).map(|_| ())
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let options: CssOptions = cx.options()?;
        let text = input.into_text()?;
        let analyzed = css::analyze(cx.resource, &text)?;

        let mut kept_imports = Vec::new();
        let mut code = analyzed.code;
        for reference in analyzed.references {
            match reference {
                CssReference::Import {
                    url,
                    condition,
                    rule,
                } => {
                    if !options.import || is_external(&url) {
                        trace!(url = %url, "import kept as written");
                        kept_imports.push(rule);
                        continue;
                    }
                    cx.add_dependency(Dependency {
                        request: module_request(&url),
                        kind: DependencyKind::StyleImport { condition },
                    });
                }
                CssReference::Url { url, placeholder } => {
                    if !options.url || is_external(&url) {
                        trace!(url = %url, "url kept as written");
                        code = code.replace(&placeholder, &url);
                        continue;
                    }
                    cx.add_dependency(Dependency {
                        request: module_request(&url),
                        kind: DependencyKind::StyleUrl { placeholder },
                    });
                }
            }
        }

        if !kept_imports.is_empty() {
            kept_imports.push(code);
            code = kept_imports.join("\n");
        }
        Ok(Source::Style(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::module::ImportCondition;
    use crate::runtime::NativeRuntime;
    use chute_config::Descriptor;
    use serde_json::{Value, json};
    use std::path::Path;

    async fn run(options: Value, source: &str) -> (String, Vec<Dependency>) {
        let env = BuildEnv::from_descriptor(&Descriptor::default().with_context("/p"));
        let runtime = NativeRuntime::new("/p");
        let mut cx = StageContext::new(
            Path::new("/p/css/a.css"),
            None,
            source.as_bytes(),
            &env,
            &runtime,
        );
        cx.options = &options;
        let out = CssStage
            .run(Source::Style(source.to_string()), &mut cx)
            .await
            .unwrap();
        let Source::Style(code) = out else {
            panic!("expected style output");
        };
        (code, cx.effects.dependencies)
    }

    #[test]
    fn external_urls() {
        assert!(is_external("https://fonts.example/x.woff"));
        assert!(is_external("//cdn.example/x.png"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("/static/x.png"));
        assert!(is_external("#mask"));
        assert!(!is_external("img/x.png"));
        assert!(!is_external("../fonts/x.eot?#iefix"));
    }

    #[test]
    fn requests() {
        assert_eq!(module_request("img/x.png"), "./img/x.png");
        assert_eq!(module_request("../x.png"), "../x.png");
        assert_eq!(module_request("~font-awesome/fonts/fa.eot"), "font-awesome/fonts/fa.eot");
    }

    #[tokio::test]
    async fn urls_and_imports_become_dependencies() {
        let (code, deps) = run(
            Value::Null,
            r#"@import "base.css"; .a { background: url(img/logo.png); } .b { background: url(https://x.example/b.png); }"#,
        )
        .await;

        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].request, "./base.css");
        assert_eq!(
            deps[0].kind,
            DependencyKind::StyleImport {
                condition: ImportCondition::default()
            }
        );
        assert_eq!(deps[1].request, "./img/logo.png");
        let DependencyKind::StyleUrl { placeholder } = &deps[1].kind else {
            panic!("expected url dependency");
        };
        assert!(code.contains(placeholder.as_str()));
        assert!(code.contains("https://x.example/b.png"));
        assert!(!code.contains("@import"));
    }

    #[tokio::test]
    async fn remote_imports_stay_and_conditions_travel() {
        let (code, deps) = run(
            Value::Null,
            r#"@import url("https://fonts.example/css?family=Roboto"); @import "print.css" print; .a { color: red; }"#,
        )
        .await;

        assert!(code.starts_with("@import "), "{code}");
        assert!(code.contains("https://fonts.example/css?family=Roboto"), "{code}");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].request, "./print.css");
        let DependencyKind::StyleImport { condition } = &deps[0].kind else {
            panic!("expected import dependency");
        };
        assert_eq!(condition.media.as_deref(), Some("print"));
    }

    #[tokio::test]
    async fn disabled_imports_are_kept() {
        let (code, deps) = run(json!({ "import": false }), r#"@import "base.css"; .a { color: red; }"#).await;
        assert!(deps.is_empty());
        assert!(code.contains("@import \"base.css\""), "{code}");
    }

    #[tokio::test]
    async fn disabled_urls_are_kept() {
        let (code, deps) = run(json!({ "url": false }), ".a { background: url(img/logo.png); }").await;
        assert!(deps.is_empty());
        assert!(code.contains("img/logo.png"));
    }
}
