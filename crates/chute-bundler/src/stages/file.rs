use async_trait::async_trait;
use chute_config::preset::stage;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Stage, StageContext, js_string, parse_options};
use crate::hash::content_hash;
use crate::module::Source;
use crate::template::{FILE_PLACEHOLDERS, Template, TemplateData};

const DEFAULT_NAME: &str = "[hash].[ext]";

/// Options shared by `file-loader` and `url-loader`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FileOptions {
    #[serde(default = "default_name")]
    pub name: String,
    /// Prefix of the asset name below the output directory.
    #[serde(default)]
    pub output_path: String,
    /// Overrides `output.publicPath` for the exported URL.
    pub public_path: Option<String>,
    #[serde(default = "default_emit")]
    pub emit_file: bool,
    /// Used by `url-loader`; accepted and ignored by `file-loader`.
    pub mimetype: Option<String>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_emit() -> bool {
    true
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            name: default_name(),
            output_path: String::new(),
            public_path: None,
            emit_file: true,
            mimetype: None,
        }
    }
}

impl FileOptions {
    pub(super) fn template(&self) -> anyhow::Result<Template> {
        Ok(Template::parse(&self.name, FILE_PLACEHOLDERS)?)
    }

    /// Emit `content` under the templated name and return its public URL.
    pub(super) fn emit(&self, content: Vec<u8>, cx: &mut StageContext<'_>) -> anyhow::Result<String> {
        let stem = cx
            .resource
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = cx
            .resource
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = cx.env.relative_dir(cx.resource);
        let hash = content_hash(&content);

        let rendered = self.template()?.render(&TemplateData {
            name: Some(&stem),
            ext: Some(&ext),
            path: Some(&path),
            hash: Some(&hash),
            ..Default::default()
        })?;
        let asset = format!("{}{rendered}", self.output_path);
        let public_path = self.public_path.as_deref().unwrap_or(&cx.env.public_path);
        let url = format!("{public_path}{asset}");

        debug!(module = %cx.resource.display(), %asset, "file");
        if self.emit_file {
            cx.emit_file(asset, content);
        }
        Ok(url)
    }
}

/// Module source exporting `url`.
pub(super) fn export_module(url: &str) -> Source {
    Source::Script(format!("module.exports = {};\n", js_string(url)))
}

/// Copies the file into the output directory; the module exports its
/// public URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStage;

#[async_trait]
impl Stage for FileStage {
    fn name(&self) -> &str {
        stage::FILE
    }

    fn validate(&self, options: &Value) -> anyhow::Result<()> {
        parse_options::<FileOptions>(options)?.template()?;
        Ok(())
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let options: FileOptions = cx.options()?;
        let url = options.emit(input.into_bytes(), cx)?;
        cx.export_url(url.clone());
        Ok(export_module(&url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::runtime::NativeRuntime;
    use crate::hash::truncate;
    use crate::stages::StageEffects;
    use chute_config::Descriptor;
    use serde_json::json;
    use std::path::Path;

    fn env() -> BuildEnv {
        let mut descriptor = Descriptor::default().with_context("/p");
        descriptor.output.public_path = "/local/assets/".to_string();
        BuildEnv::from_descriptor(&descriptor)
    }

    async fn run(options: Value, path: &str, content: &[u8]) -> (Source, StageEffects) {
        let env = env();
        let runtime = NativeRuntime::new("/");
        let mut cx = StageContext::new(Path::new(path), None, content, &env, &runtime);
        cx.options = &options;
        let out = FileStage
            .run(Source::Raw(content.to_vec()), &mut cx)
            .await
            .unwrap();
        (out, cx.effects)
    }

    #[tokio::test]
    async fn font_keeps_its_name() {
        let (out, effects) = run(
            json!({ "name": "[name].[ext]", "outputPath": "local/fonts/" }),
            "/p/node_modules/fa/fonts/fa.woff2",
            b"wOF2",
        )
        .await;

        assert_eq!(
            out,
            Source::Script("module.exports = \"/local/assets/local/fonts/fa.woff2\";\n".into())
        );
        assert_eq!(effects.assets[0].name, "local/fonts/fa.woff2");
        assert_eq!(
            effects.exported_url.as_deref(),
            Some("/local/assets/local/fonts/fa.woff2")
        );
    }

    #[tokio::test]
    async fn template_hash_follows_content() {
        let options = json!({ "name": "[name].mustache?[hash]", "outputPath": "mustache/" });
        let (_, first) = run(options.clone(), "/p/tpl/card.mustache", b"{{title}}").await;
        let (_, second) = run(options, "/p/tpl/card.mustache", b"{{name}}").await;

        let hash = content_hash(b"{{title}}");
        assert_eq!(
            first.assets[0].name,
            format!("mustache/card.mustache?{}", truncate(&hash, 20))
        );
        assert_ne!(first.assets[0].name, second.assets[0].name);
    }

    #[tokio::test]
    async fn default_name_and_path_placeholder() {
        let (_, effects) = run(Value::Null, "/p/img/logo.png", b"png").await;
        assert_eq!(
            effects.assets[0].name,
            format!("{}.png", truncate(&content_hash(b"png"), 20))
        );

        let (_, effects) = run(
            json!({ "name": "[path][name].[ext]", "emitFile": false, "publicPath": "https://cdn/" }),
            "/p/img/logo.png",
            b"png",
        )
        .await;
        assert!(effects.assets.is_empty());
        assert_eq!(effects.exported_url.as_deref(), Some("https://cdn/img/logo.png"));
    }

    #[test]
    fn validation() {
        assert!(FileStage.validate(&json!({ "name": "[name].[id]" })).is_err());
        assert!(FileStage.validate(&json!({ "emitFile": "yes" })).is_err());
        assert!(FileStage.validate(&json!({ "mimetype": "image/svg+xml" })).is_ok());
    }
}
