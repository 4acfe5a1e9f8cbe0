use async_trait::async_trait;
use chute_config::preset::stage;
use serde::Deserialize;
use serde_json::Value;

use super::{Stage, StageContext, parse_options};
use crate::builtins::css;
use crate::module::Source;

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Queries {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Queries {
    fn to_vec(&self) -> Vec<String> {
        match self {
            Queries::None => Vec::new(),
            Queries::One(query) => vec![query.clone()],
            Queries::Many(queries) => queries.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PostcssOptions {
    /// Browserslist queries used for vendor prefixing and syntax lowering.
    #[serde(default)]
    browsers: Queries,
}

/// Parses and normalizes a stylesheet with lightningcss.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcssStage;

#[async_trait]
impl Stage for PostcssStage {
    fn name(&self) -> &str {
        stage::POSTCSS
    }

    fn validate(&self, options: &Value) -> anyhow::Result<()> {
        let options: PostcssOptions = parse_options(options)?;
        css::browser_targets(&options.browsers.to_vec())?;
        Ok(())
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let options: PostcssOptions = cx.options()?;
        let targets = css::browser_targets(&options.browsers.to_vec())?;
        let text = input.into_text()?;
        let normalized = css::normalize(cx.resource, &text, targets)?;
        Ok(Source::Style(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::runtime::NativeRuntime;
    use chute_config::Descriptor;
    use serde_json::json;
    use std::path::Path;

    #[tokio::test]
    async fn raw_css_becomes_a_stylesheet() {
        let env = BuildEnv::from_descriptor(&Descriptor::default().with_context("/p"));
        let source = ".a { color: #ff0000; }\n";
        let runtime = NativeRuntime::new("/");
        let mut cx = StageContext::new(Path::new("/p/a.css"), None, source.as_bytes(), &env, &runtime);
        let out = PostcssStage
            .run(Source::Raw(source.as_bytes().to_vec()), &mut cx)
            .await
            .unwrap();
        let Source::Style(css) = out else {
            panic!("expected style output");
        };
        assert!(css.contains(".a {"));
        assert!(css.contains("color:"));
    }

    #[test]
    fn browsers_accepts_string_or_list() {
        assert!(PostcssStage.validate(&json!({ "browsers": "last 2 versions" })).is_ok());
        assert!(PostcssStage.validate(&json!({ "browsers": ["> 1%", "ie 11"] })).is_ok());
        assert!(PostcssStage.validate(&json!({ "browsers": ["not a query at all"] })).is_err());
    }
}
