use async_trait::async_trait;
use chute_config::preset::plugin;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{LifecyclePlugin, PluginContext, PluginPhase};
use crate::builtins::css;
use crate::stages::parse_options;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscardComments {
    #[serde(default)]
    remove_all: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizeCssOptions {
    #[serde(default = "default_pattern")]
    asset_name_reg_exp: String,
    #[serde(default)]
    discard_comments: DiscardComments,
}

fn default_pattern() -> String {
    r"\.css$".to_string()
}

impl Default for OptimizeCssOptions {
    fn default() -> Self {
        Self {
            asset_name_reg_exp: default_pattern(),
            discard_comments: DiscardComments::default(),
        }
    }
}

/// Minifies emitted stylesheets whose name matches a pattern.
#[derive(Debug, Clone)]
pub struct OptimizeCssPlugin {
    pattern: Regex,
    drop_comments: bool,
}

impl OptimizeCssPlugin {
    pub fn from_options(options: &Value) -> anyhow::Result<Self> {
        let options: OptimizeCssOptions = parse_options(options)?;
        Ok(Self {
            pattern: Regex::new(&options.asset_name_reg_exp)?,
            drop_comments: options.discard_comments.remove_all,
        })
    }
}

#[async_trait]
impl LifecyclePlugin for OptimizeCssPlugin {
    fn name(&self) -> &str {
        plugin::OPTIMIZE_CSS
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Optimize
    }

    async fn apply(&self, cx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        let mut minified = Vec::new();
        for asset in cx.assets.iter() {
            if !self.pattern.is_match(asset.file_name()) {
                continue;
            }
            let text = asset
                .text()
                .ok_or_else(|| anyhow::anyhow!("{} is not UTF-8 text", asset.name))?;
            let code = css::minify(asset.file_name(), text, self.drop_comments)?;
            debug!(asset = %asset.name, before = text.len(), after = code.len(), "minified stylesheet");
            minified.push((asset.name.clone(), code));
        }
        for (name, code) in minified {
            cx.assets.update(&name, code.into_bytes());
        }
        Ok(())
    }
}
