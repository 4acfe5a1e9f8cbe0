//! Check command implementation.
//!
//! Compiles the descriptor without reading any module, then shows the rules
//! in the order they are tried.

use std::fmt::Write as _;

use chute_bundler::Bundler;
use chute_config::{Descriptor, Overrides};

use crate::cli::CheckArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Execute the check command.
///
/// Fails on anything the build would reject before touching the
/// filesystem, plus missing entry files.
pub async fn execute(args: CheckArgs) -> Result<()> {
    let descriptor = utils::load_descriptor(&args.project, Overrides::default())?;
    Bundler::new(descriptor.clone()).compile()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    print!("{}", rule_table(&descriptor));
    ui::success(&format!(
        "Descriptor is valid: {} entries, {} rules, {} plugins",
        descriptor.entry.len(),
        descriptor.module.rules.len(),
        descriptor.plugins.len()
    ));
    Ok(())
}

/// One line per rule: index, test pattern, exclusions and the stage chain.
pub fn rule_table(descriptor: &Descriptor) -> String {
    let width = descriptor
        .module
        .rules
        .iter()
        .map(|rule| rule.test.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (index, rule) in descriptor.module.rules.iter().enumerate() {
        let chain = rule
            .stages
            .iter()
            .map(|stage| stage.loader.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        let _ = write!(out, "{index:>2}  {:<width$}  {chain}", rule.test);
        if let Some(include) = &rule.include {
            let _ = write!(out, "  include {include}");
        }
        if let Some(exclude) = &rule.exclude {
            let _ = write!(out, "  exclude {exclude}");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_rule_table() {
        let table = rule_table(&Descriptor::production());
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 12);
        assert!(lines[0].starts_with(" 0  \\.vue$"));
        assert!(lines[0].ends_with("exclude (node_modules|bower_components|public_html/build/)"));
        assert!(lines[2].contains(
            "sass-loader -> resolve-url-loader -> postcss-loader -> css-loader -> css-extract-loader"
        ));
        assert!(lines[11].contains("file-loader"));
    }
}
