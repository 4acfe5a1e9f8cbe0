use async_trait::async_trait;
use chute_config::preset::{plugin, stage};

use super::{Stage, StageContext};
use crate::module::Source;

/// Moves a stylesheet out of the script graph. The `css-extract` plugin
/// later writes it into the stylesheet of every entry that reaches the
/// module; the module itself becomes an empty script.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssExtractStage;

#[async_trait]
impl Stage for CssExtractStage {
    fn name(&self) -> &str {
        stage::CSS_EXTRACT
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        if !cx.env.has_plugin(plugin::CSS_EXTRACT) {
            anyhow::bail!(
                "{} requires the '{}' plugin to be registered",
                stage::CSS_EXTRACT,
                plugin::CSS_EXTRACT
            );
        }
        let css = match input {
            Source::Style(css) => css,
            other => anyhow::bail!("expected a stylesheet, got {} input", other.kind()),
        };
        cx.extract_css(css);
        Ok(Source::Script(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::runtime::NativeRuntime;
    use chute_config::Descriptor;
    use std::path::Path;

    #[tokio::test]
    async fn stylesheet_is_handed_over() {
        let mut env = BuildEnv::from_descriptor(&Descriptor::default().with_context("/p"));
        env.plugins.push(plugin::CSS_EXTRACT.to_string());
        let runtime = NativeRuntime::new("/");
        let mut cx = StageContext::new(Path::new("/p/a.css"), None, b"", &env, &runtime);

        let out = CssExtractStage
            .run(Source::Style(".a{}".into()), &mut cx)
            .await
            .unwrap();
        assert_eq!(out, Source::Script(String::new()));
        assert_eq!(cx.effects.extracted_css.as_deref(), Some(".a{}"));

        let err = CssExtractStage
            .run(Source::Raw(b".a{}".to_vec()), &mut cx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("raw"));
    }
}
