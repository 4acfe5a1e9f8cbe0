use std::path::Path;

use async_trait::async_trait;
use chute_config::preset::plugin;
use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{LifecyclePlugin, PluginContext, PluginPhase};
use crate::builtins::script::{self, MinifiedScript, MinifySettings};
use crate::output::{Asset, AssetKind};
use crate::stages::parse_options;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptMinifyOptions {
    #[serde(default = "default_test")]
    test: String,
    #[serde(default)]
    parallel: bool,
    /// Move license comments into `<file>.LICENSE`.
    #[serde(default)]
    extract_comments: bool,
    /// Keep license comments in the minified output.
    #[serde(default)]
    comments: bool,
    #[serde(default = "enabled")]
    mangle: bool,
    #[serde(default = "enabled")]
    compress: bool,
}

fn default_test() -> String {
    r"\.js$".to_string()
}

fn enabled() -> bool {
    true
}

impl Default for ScriptMinifyOptions {
    fn default() -> Self {
        Self {
            test: default_test(),
            parallel: false,
            extract_comments: false,
            comments: false,
            mangle: true,
            compress: true,
        }
    }
}

/// Minifies emitted scripts with oxc.
#[derive(Debug, Clone)]
pub struct ScriptMinifyPlugin {
    test: Regex,
    parallel: bool,
    extract_comments: bool,
    settings: MinifySettings,
}

impl ScriptMinifyPlugin {
    pub fn from_options(options: &Value) -> anyhow::Result<Self> {
        let options: ScriptMinifyOptions = parse_options(options)?;
        Ok(Self {
            test: Regex::new(&options.test)?,
            parallel: options.parallel,
            extract_comments: options.extract_comments,
            settings: MinifySettings {
                mangle: options.mangle,
                compress: options.compress,
                keep_license_comments: options.comments && !options.extract_comments,
            },
        })
    }
}

fn license_banner(license_file: &str) -> String {
    let base = Path::new(license_file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| license_file.to_string());
    format!("/*! For license information please see {base} */\n")
}

struct Job {
    name: String,
    file_name: String,
    entry: Option<String>,
    code: String,
}

#[async_trait]
impl LifecyclePlugin for ScriptMinifyPlugin {
    fn name(&self) -> &str {
        plugin::SCRIPT_MINIFY
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Optimize
    }

    async fn apply(&self, cx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        let jobs = cx
            .assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Script && self.test.is_match(asset.file_name()))
            .map(|asset| {
                let code = asset
                    .text()
                    .ok_or_else(|| anyhow::anyhow!("{} is not UTF-8 text", asset.name))?;
                Ok(Job {
                    name: asset.name.clone(),
                    file_name: asset.file_name().to_string(),
                    entry: asset.entry.clone(),
                    code: code.to_string(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        if jobs.is_empty() {
            return Ok(());
        }

        let settings = self.settings;
        let parallel = self.parallel;
        debug!(scripts = jobs.len(), parallel, "minifying");
        let results = tokio::task::spawn_blocking(move || {
            let run = |job: Job| -> anyhow::Result<(Job, MinifiedScript)> {
                let minified = script::minify(&job.file_name, &job.code, settings)?;
                Ok((job, minified))
            };
            if parallel {
                jobs.into_par_iter().map(run).collect::<anyhow::Result<Vec<_>>>()
            } else {
                jobs.into_iter().map(run).collect::<anyhow::Result<Vec<_>>>()
            }
        })
        .await??;

        for (job, minified) in results {
            let mut code = minified.code;
            if self.extract_comments && !minified.license_comments.is_empty() {
                let license_name = format!("{}.LICENSE", job.file_name);
                code = format!("{}{code}", license_banner(&license_name));
                let mut license = Asset::new(
                    license_name,
                    format!("{}\n", minified.license_comments.join("\n\n")).into_bytes(),
                    AssetKind::License,
                );
                license.entry = job.entry.clone();
                cx.assets.insert(license)?;
            }
            cx.assets.update(&job.name, code.into_bytes());
        }
        Ok(())
    }
}
