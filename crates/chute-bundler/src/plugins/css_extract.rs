use async_trait::async_trait;
use chute_config::preset::plugin;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{LifecyclePlugin, PluginContext, PluginPhase};
use crate::builtins::css;
use crate::hash::content_hash;
use crate::output::{Asset, AssetKind};
use crate::stages::parse_options;
use crate::template::{CHUNK_PLACEHOLDERS, Template, TemplateData};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CssExtractOptions {
    #[serde(default = "default_filename")]
    filename: String,
    /// Name of stylesheets for non-entry chunks. Builds have no such chunks;
    /// the template is still checked.
    chunk_filename: Option<String>,
}

fn default_filename() -> String {
    "[name].css".to_string()
}

impl Default for CssExtractOptions {
    fn default() -> Self {
        Self {
            filename: default_filename(),
            chunk_filename: None,
        }
    }
}

/// Writes one stylesheet per build target out of the CSS that
/// `css-extract-loader` took from the modules it reaches.
#[derive(Debug, Clone)]
pub struct CssExtractPlugin {
    filename: Template,
}

impl CssExtractPlugin {
    pub fn from_options(options: &Value) -> anyhow::Result<Self> {
        let options: CssExtractOptions = parse_options(options)?;
        if let Some(chunk) = &options.chunk_filename {
            Template::parse(chunk, CHUNK_PLACEHOLDERS)?;
        }
        Ok(Self {
            filename: Template::parse(&options.filename, CHUNK_PLACEHOLDERS)?,
        })
    }
}

#[async_trait]
impl LifecyclePlugin for CssExtractPlugin {
    fn name(&self) -> &str {
        plugin::CSS_EXTRACT
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Emit
    }

    async fn apply(&self, cx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        let graph = cx.graph()?;
        let mut stylesheets = Vec::new();

        for (index, (name, roots)) in graph.entries().iter().enumerate() {
            // Imported sheets come ahead of their importers. `@import` rules
            // left in a sheet are only valid at the very top, so they move
            // there.
            let mut imports: Vec<String> = Vec::new();
            let mut parts = Vec::new();
            for (id, conditions) in graph.style_order(roots) {
                let module = graph.module(id);
                let Some(extracted) = &module.extracted_css else {
                    continue;
                };
                let substituted = graph.substitute_urls(id, extracted)?;
                let (kept, rest) =
                    css::split_imports(&module.path.to_string_lossy(), &substituted)?;
                if !kept.is_empty() && !conditions.is_empty() {
                    warn!(
                        module = %module.path.display(),
                        "@import inside a conditionally imported sheet is hoisted without the condition"
                    );
                }
                for rule in kept {
                    if !imports.contains(&rule) {
                        imports.push(rule);
                    }
                }
                parts.push(
                    conditions
                        .iter()
                        .rev()
                        .fold(rest, |css, condition| condition.wrap(&css)),
                );
            }
            if parts.is_empty() {
                continue;
            }

            imports.extend(parts);
            let mut css = imports.join("\n");
            if !css.ends_with('\n') {
                css.push('\n');
            }
            let hash = content_hash(css.as_bytes());
            let id = index.to_string();
            let file = self.filename.render(&TemplateData {
                name: Some(name),
                id: Some(&id),
                hash: Some(&hash),
                ..Default::default()
            })?;
            debug!(entry = %name, asset = %file, "extracted stylesheet");
            stylesheets.push(Asset::new(file, css.into_bytes(), AssetKind::Style).for_entry(name));
        }

        for asset in stylesheets {
            cx.assets.insert(asset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn templates_are_checked() {
        assert!(CssExtractPlugin::from_options(&json!({ "filename": "local/[name]/[name].css" })).is_ok());
        assert!(CssExtractPlugin::from_options(&json!({ "filename": "[name].[ext]" })).is_err());
        assert!(CssExtractPlugin::from_options(&json!({ "chunkFilename": "[nope].css" })).is_err());
    }
}
