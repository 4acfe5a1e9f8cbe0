//! Formatting utilities for sizes, durations, and build summaries.

use std::time::Duration;

use chute_bundler::{AssetKind, BuildReport};
use console::Term;
use owo_colors::OwoColorize;

use super::colors_enabled;

/// Format file size in human-readable format.
///
/// ```
/// use chute_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use chute_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn kind_label(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Script => "js",
        AssetKind::Style => "css",
        AssetKind::File => "file",
        AssetKind::License => "license",
    }
}

/// Print the emitted assets with their sizes to stderr.
pub fn print_build_summary(report: &BuildReport) {
    let width = Term::stderr().size().1 as usize;
    let rule = "─".repeat(width.clamp(20, 80));
    let colors = colors_enabled();

    if colors {
        eprintln!("\n{}", "Build Summary".bold().underline());
    } else {
        eprintln!("\nBuild Summary");
    }
    eprintln!("{rule}");

    for asset in &report.assets {
        let size = format_size(asset.size as u64);
        let kind = kind_label(asset.kind);
        if colors {
            eprintln!(
                "  {} {} {} {}",
                "▸".blue(),
                asset.name.bright_white().bold(),
                size.dimmed(),
                format!("({kind})").dimmed()
            );
        } else {
            eprintln!("  ▸ {} {size} ({kind})", asset.name);
        }
    }

    eprintln!("{rule}");
    let total: u64 = report.assets.iter().map(|a| a.size as u64).sum();
    let line = format!(
        "{} modules, {} assets, {} in {}",
        report.modules(),
        report.assets.len(),
        format_size(total),
        format_duration(report.duration)
    );
    if colors {
        eprintln!("  {} {}", "Total:".bold(), line.green());
    } else {
        eprintln!("  Total: {line}");
    }
}
