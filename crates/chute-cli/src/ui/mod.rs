//! Terminal output: status lines and the build summary.
//!
//! Everything goes to stderr so stdout stays free for `check --json`.

mod format;
mod messages;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::{format_duration, format_size, print_build_summary};
pub use messages::{error, info, success, warning};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR, then falls back to terminal detection.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Decide once whether output is colored. `--no-color` always wins.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && should_use_color();
    COLORS.store(enabled, Ordering::Relaxed);
    console::set_colors_enabled_stderr(enabled);
}

pub(crate) fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}
