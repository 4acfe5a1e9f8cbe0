//! Tests for the production preset.

use chute_config::preset::{plugin, stage};
use chute_config::{Descriptor, Devtool, Mode, SchemaValidator, ConfigValidator};
use std::path::PathBuf;

fn chain(descriptor: &Descriptor, test: &str) -> Vec<String> {
    descriptor
        .module
        .rules
        .iter()
        .find(|rule| rule.test == test)
        .unwrap_or_else(|| panic!("no rule for {test}"))
        .stages
        .iter()
        .map(|s| s.loader.clone())
        .collect()
}

#[test]
fn output_layout() {
    let d = Descriptor::production();
    assert_eq!(d.mode, Mode::Production);
    assert_eq!(d.output.filename, "local/[name]/[name].js");
    assert_eq!(d.output.path, PathBuf::from("local/assets/"));
    assert_eq!(d.output.public_path, "/local/assets/");
    assert!(!d.watch);
    assert_eq!(d.watch_options.aggregate_timeout, 100);
    assert_eq!(d.devtool, Devtool::Flag(false));
}

#[test]
fn rule_order_is_declared_order() {
    let d = Descriptor::production();
    let tests: Vec<_> = d.module.rules.iter().map(|r| r.test.as_str()).collect();
    assert_eq!(tests[0], r"\.vue$");
    assert_eq!(tests[1], r"\.(js|jsx)$");
    assert_eq!(tests[2], r"\.sass$");
    assert_eq!(tests[3], r"\.css$");
    assert_eq!(tests.last(), Some(&r"\.mustache$"));
    assert_eq!(tests.len(), 12);
}

#[test]
fn sass_chain_in_execution_order() {
    let d = Descriptor::production();
    assert_eq!(
        chain(&d, r"\.sass$"),
        vec![
            stage::SASS,
            stage::RESOLVE_URL,
            stage::POSTCSS,
            stage::CSS,
            stage::CSS_EXTRACT
        ]
    );
    assert_eq!(
        chain(&d, r"\.css$"),
        vec![stage::POSTCSS, stage::CSS, stage::CSS_EXTRACT]
    );
}

#[test]
fn mustache_and_font_options() {
    let d = Descriptor::production();
    let mustache = d.module.rules.last().unwrap();
    assert_eq!(mustache.stages[0].options["name"], "[name].mustache?[hash]");
    assert_eq!(mustache.stages[0].options["outputPath"], "mustache/");

    let ttf = d
        .module
        .rules
        .iter()
        .find(|r| r.test.starts_with(r"\.ttf"))
        .unwrap();
    assert_eq!(ttf.stages[0].options["outputPath"], "local/fonts/");
    assert_eq!(ttf.stages[0].options["mimetype"], "application/octet-stream");
}

#[test]
fn images_exclude_vendor_directories() {
    let d = Descriptor::production();
    for test in [r"\.gif", r"\.jpg", r"\.png"] {
        let rule = d.module.rules.iter().find(|r| r.test == test).unwrap();
        assert_eq!(rule.exclude.as_deref(), Some("(node_modules|bower_components)"));
        assert_eq!(rule.stages[0].loader, stage::URL);
    }
    let jpg = d.module.rules.iter().find(|r| r.test == r"\.jpg").unwrap();
    assert!(jpg.stages[0].options.is_null());
}

#[test]
fn cleanup_registered_before_extraction() {
    let d = Descriptor::production();
    let clean = d.plugin_position(plugin::CLEAN).unwrap();
    let extract = d.plugin_position(plugin::CSS_EXTRACT).unwrap();
    assert!(clean < extract);
    assert_eq!(
        d.plugins[clean].options["paths"],
        serde_json::json!(["local/assets/local", "local/assets/mustache"])
    );
    assert_eq!(d.optimization.minimizer[0].name, plugin::SCRIPT_MINIFY);
}

#[test]
fn resolution_settings() {
    let d = Descriptor::production();
    assert_eq!(d.resolve.alias["vue"], "vue/dist/vue.min.js");
    assert_eq!(
        d.resolve.modules,
        vec!["node_modules", "blocks", "local/assets/vendor"]
    );
    assert_eq!(d.resolve.extensions, vec!["*", ".js", ".vue"]);
    assert_eq!(
        d.resolve_loader.candidates("babel"),
        vec!["babel", "babel-loader"]
    );
}

#[test]
fn preset_needs_entries() {
    let d = Descriptor::production();
    assert!(SchemaValidator.validate(&d).is_err());
    let d = d.with_entry("app", "src/app.js");
    assert!(SchemaValidator.validate(&d).is_ok());
}
