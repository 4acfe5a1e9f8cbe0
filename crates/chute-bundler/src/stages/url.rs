use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chute_config::preset::stage;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::file::{FileOptions, export_module};
use super::{Stage, StageContext, parse_options};
use crate::module::Source;

#[derive(Debug, Default, Deserialize)]
struct UrlOptions {
    /// Largest file, in bytes, that is inlined. No limit inlines everything.
    limit: Option<u64>,
    #[serde(flatten)]
    file: FileOptions,
}

/// Content types for files `infer` cannot sniff (text formats, fonts it
/// does not know).
fn mime_from_extension(ext: &str) -> Option<&'static str> {
    Some(match ext.to_ascii_lowercase().as_str() {
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "css" => "text/css",
        "txt" | "mustache" => "text/plain",
        _ => return None,
    })
}

fn data_uri(mime: &str, content: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(content))
}

/// Inlines small files as `data:` URIs and hands larger ones to the file
/// emitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlStage;

#[async_trait]
impl Stage for UrlStage {
    fn name(&self) -> &str {
        stage::URL
    }

    fn validate(&self, options: &Value) -> anyhow::Result<()> {
        parse_options::<UrlOptions>(options)?.file.template()?;
        Ok(())
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let options: UrlOptions = cx.options()?;
        let content = input.into_bytes();

        let inline = options
            .limit
            .is_none_or(|limit| content.len() as u64 <= limit);
        let url = if inline {
            let mime = options
                .file
                .mimetype
                .clone()
                .or_else(|| infer::get(&content).map(|kind| kind.mime_type().to_string()))
                .or_else(|| {
                    cx.resource
                        .extension()
                        .and_then(|ext| mime_from_extension(&ext.to_string_lossy()))
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            debug!(module = %cx.resource.display(), size = content.len(), %mime, "inlined");
            data_uri(&mime, &content)
        } else {
            options.file.emit(content, cx)?
        };

        cx.export_url(url.clone());
        Ok(export_module(&url))
    }
}
