use async_trait::async_trait;
use chute_config::preset::stage;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{Stage, StageContext, parse_options};
use crate::builtins::script;
use crate::module::Source;

const ENV_PRESETS: &[&str] = &[
    "env",
    "es2015",
    "@babel/env",
    "@babel/preset-env",
    "babel-preset-env",
    "babel-preset-es2015",
];

/// Syntax plugins the lowering covers, with the newest target that still
/// lowers them.
const KNOWN_PLUGINS: &[(&str, &str)] = &[
    ("transform-async-to-generator", "es2016"),
    ("@babel/plugin-transform-async-to-generator", "es2016"),
    ("transform-object-rest-spread", "es2017"),
    ("@babel/plugin-proposal-object-rest-spread", "es2017"),
    ("@babel/plugin-transform-object-rest-spread", "es2017"),
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BabelOptions {
    #[serde(default)]
    presets: Vec<Value>,
    #[serde(default)]
    plugins: Vec<Value>,
    /// Explicit lowering target, e.g. `es2017`.
    target: Option<String>,
}

/// `"name"` or `["name", { ...options }]`.
fn entry_name(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(name) => Some(name),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

impl BabelOptions {
    fn target(&self) -> String {
        if let Some(target) = &self.target {
            return target.clone();
        }
        if !self.presets.is_empty() {
            return "es2015".to_string();
        }
        self.plugins
            .iter()
            .filter_map(entry_name)
            .filter_map(|name| KNOWN_PLUGINS.iter().find(|(n, _)| *n == name))
            .map(|(_, target)| *target)
            .min()
            .unwrap_or("esnext")
            .to_string()
    }
}

/// Lowers modern script syntax with oxc.
///
/// `presets: ["env"]` lowers to ES2015; without presets only the listed
/// syntax plugins decide the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct BabelStage;

#[async_trait]
impl Stage for BabelStage {
    fn name(&self) -> &str {
        stage::BABEL
    }

    fn validate(&self, options: &Value) -> anyhow::Result<()> {
        let options: BabelOptions = parse_options(options)?;
        for preset in &options.presets {
            let name = entry_name(preset)
                .ok_or_else(|| anyhow::anyhow!("malformed preset entry {preset}"))?;
            if !ENV_PRESETS.contains(&name) {
                anyhow::bail!("unsupported preset '{name}'");
            }
        }
        for plugin in &options.plugins {
            entry_name(plugin)
                .ok_or_else(|| anyhow::anyhow!("malformed plugin entry {plugin}"))?;
        }
        let target = options.target();
        oxc_transformer::TransformOptions::from_target(&target)
            .map_err(|e| anyhow::anyhow!("invalid target '{target}': {e}"))?;
        Ok(())
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let options: BabelOptions = cx.options()?;
        for name in options.plugins.iter().filter_map(entry_name) {
            if !KNOWN_PLUGINS.iter().any(|(known, _)| *known == name) {
                warn!(plugin = name, module = %cx.resource.display(), "ignoring unknown script plugin");
            }
        }

        let code = input.into_text()?;
        let lowered = script::lower(cx.resource, &code, &options.target())?;
        Ok(Source::Script(lowered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> BabelOptions {
        parse_options(&value).unwrap()
    }

    #[test]
    fn target_selection() {
        assert_eq!(options(json!({ "presets": ["env"] })).target(), "es2015");
        assert_eq!(
            options(json!({ "plugins": ["transform-object-rest-spread"] })).target(),
            "es2017"
        );
        assert_eq!(
            options(json!({
                "plugins": ["transform-object-rest-spread", "transform-async-to-generator"]
            }))
            .target(),
            "es2016"
        );
        assert_eq!(options(Value::Null).target(), "esnext");
        assert_eq!(
            options(json!({ "presets": ["env"], "target": "es2020" })).target(),
            "es2020"
        );
    }

    #[test]
    fn validation() {
        let stage = BabelStage;
        assert!(stage.validate(&json!({ "presets": [["env", { "loose": true }]] })).is_ok());
        assert!(stage.validate(&json!({ "presets": ["react"] })).is_err());
        assert!(stage.validate(&json!({ "presets": [1] })).is_err());
        assert!(stage.validate(&json!({ "target": "es1999" })).is_err());
    }
}
