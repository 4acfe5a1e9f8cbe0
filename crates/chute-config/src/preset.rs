//! Built-in production descriptor.
//!
//! Mirrors the production build the asset tree was originally laid out for:
//! scripts and extracted stylesheets under `local/<target>/`, fonts and
//! images under `local/fonts/`, template partials under `mustache/`.

use std::path::PathBuf;

use serde_json::json;

use crate::descriptor::{
    Descriptor, Devtool, EntryMap, Mode, ModuleOptions, OptimizationOptions, OutputOptions,
    PluginSpec, ResolveLoaderOptions, ResolveOptions, Rule, StageRef, WatchOptions,
};
use crate::descriptor::helpers::default_host;

/// Registry names of the built-in transform stages.
pub mod stage {
    pub const VUE: &str = "vue-loader";
    pub const BABEL: &str = "babel-loader";
    pub const SASS: &str = "sass-loader";
    pub const RESOLVE_URL: &str = "resolve-url-loader";
    pub const POSTCSS: &str = "postcss-loader";
    pub const CSS: &str = "css-loader";
    pub const CSS_EXTRACT: &str = "css-extract-loader";
    pub const FILE: &str = "file-loader";
    pub const URL: &str = "url-loader";
}

/// Registry names of the built-in lifecycle plugins and minimizers.
pub mod plugin {
    pub const VUE: &str = "vue-loader";
    pub const CLEAN: &str = "clean";
    pub const CSS_EXTRACT: &str = "css-extract";
    pub const OPTIMIZE_CSS: &str = "optimize-css-assets";
    pub const SCRIPT_MINIFY: &str = "script-minify";
}

const SCRIPT_EXCLUDE: &str = r"(node_modules|bower_components|build/)";
const VUE_EXCLUDE: &str = r"(node_modules|bower_components|public_html/build/)";
const VENDOR_EXCLUDE: &str = r"(node_modules|bower_components)";
const FONT_VERSION_SUFFIX: &str = r"(\?v=\d+\.\d+\.\d+)?$";

impl Descriptor {
    /// The production descriptor. Entries are supplied by the caller.
    ///
    /// `HOST` is read from the environment at construction.
    pub fn production() -> Self {
        Self {
            mode: Mode::Production,
            context: PathBuf::from("."),
            entry: EntryMap::new(),
            output: OutputOptions {
                filename: "local/[name]/[name].js".to_string(),
                path: PathBuf::from("local/assets/"),
                public_path: "/local/assets/".to_string(),
            },
            module: ModuleOptions {
                rules: production_rules(),
            },
            plugins: production_plugins(),
            resolve: ResolveOptions {
                alias: [("vue".to_string(), "vue/dist/vue.min.js".to_string())]
                    .into_iter()
                    .collect(),
                modules: vec![
                    "node_modules".to_string(),
                    "blocks".to_string(),
                    "local/assets/vendor".to_string(),
                ],
                extensions: vec!["*".to_string(), ".js".to_string(), ".vue".to_string()],
            },
            resolve_loader: ResolveLoaderOptions {
                modules: vec!["node_modules".to_string()],
                module_extensions: vec!["*-loader".to_string(), "*".to_string()],
                extensions: vec!["*".to_string(), ".js".to_string()],
            },
            optimization: OptimizationOptions {
                minimize: true,
                minimizer: vec![PluginSpec::with_options(
                    plugin::SCRIPT_MINIFY,
                    json!({
                        "test": r"(?i)\.js$",
                        "parallel": true,
                        "extractComments": true,
                        "comments": false,
                    }),
                )],
            },
            watch: false,
            watch_options: WatchOptions {
                aggregate_timeout: 100,
                ignored: Vec::new(),
            },
            devtool: Devtool::Flag(false),
            host: default_host(),
        }
    }
}

fn production_plugins() -> Vec<PluginSpec> {
    vec![
        PluginSpec::new(plugin::VUE),
        // Must stay ahead of anything that writes into these directories.
        PluginSpec::with_options(
            plugin::CLEAN,
            json!({ "paths": ["local/assets/local", "local/assets/mustache"] }),
        ),
        PluginSpec::with_options(
            plugin::CSS_EXTRACT,
            json!({
                "filename": "local/[name]/[name].css",
                "chunkFilename": "[id].css",
            }),
        ),
        PluginSpec::with_options(
            plugin::OPTIMIZE_CSS,
            json!({
                "assetNameRegExp": r"\.css$",
                "discardComments": { "removeAll": true },
                "canPrint": false,
            }),
        ),
    ]
}

fn font(test: String, mimetype: Option<&str>) -> Rule {
    let mut options = json!({
        "name": "[name].[ext]",
        "outputPath": "local/fonts/",
    });
    if let Some(mimetype) = mimetype {
        options["mimetype"] = json!(mimetype);
    }
    Rule::new(test).stage(StageRef::with_options(stage::FILE, options))
}

fn inline_image(test: &str, mimetype: &str) -> Rule {
    Rule::new(test)
        .exclude(VENDOR_EXCLUDE)
        .stage(StageRef::with_options(
            stage::URL,
            json!({
                "name": "local/fonts/[name].[ext]?[hash]",
                "limit": 10000,
                "mimetype": mimetype,
            }),
        ))
}

fn production_rules() -> Vec<Rule> {
    let style_tail = || {
        [
            StageRef::new(stage::POSTCSS),
            StageRef::new(stage::CSS),
            StageRef::new(stage::CSS_EXTRACT),
        ]
    };

    let mut sass = Rule::new(r"\.sass$")
        .stage(StageRef::with_options(
            stage::SASS,
            json!({ "indentedSyntax": true, "sassOptions": { "indentedSyntax": true } }),
        ))
        .stage(stage::RESOLVE_URL);
    sass.stages.extend(style_tail());

    let mut css = Rule::new(r"\.css$");
    css.stages.extend(style_tail());

    vec![
        Rule::new(r"\.vue$").exclude(VUE_EXCLUDE).stage(stage::VUE),
        Rule::new(r"\.(js|jsx)$")
            .exclude(SCRIPT_EXCLUDE)
            .stage(StageRef::with_options(
                stage::BABEL,
                json!({
                    "presets": ["env"],
                    "plugins": ["transform-object-rest-spread", "transform-async-to-generator"],
                }),
            )),
        sass,
        css,
        font(format!(r"\.eot{FONT_VERSION_SUFFIX}"), None),
        font(r"\.(woff|woff2)$".to_string(), None),
        font(
            format!(r"\.ttf{FONT_VERSION_SUFFIX}"),
            Some("application/octet-stream"),
        ),
        font(format!(r"\.svg{FONT_VERSION_SUFFIX}"), Some("image/svg+xml")),
        inline_image(r"\.gif", "image/gif"),
        Rule::new(r"\.jpg").exclude(VENDOR_EXCLUDE).stage(stage::URL),
        inline_image(r"\.png", "image/png"),
        Rule::new(r"\.mustache$").stage(StageRef::with_options(
            stage::FILE,
            json!({
                "name": "[name].mustache?[hash]",
                "outputPath": "mustache/",
            }),
        )),
    ]
}
