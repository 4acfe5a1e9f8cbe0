//! Logging setup for the chute CLI.
//!
//! The libraries emit `tracing` events; this installs the subscriber that
//! prints them.
//!
//! 1. `--verbose`: debug for the chute crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`, when set
//! 4. otherwise info for the chute crates
//!
//! ```rust,no_run
//! use chute_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("starting build");
//! ```

use chute_bundler::LogLevel;
use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &["chute", "chute_cli", "chute_bundler", "chute_config"];

fn directives(level: LogLevel) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter for the given flags.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives(LogLevel::Debug))
    } else if quiet {
        EnvFilter::new(directives(LogLevel::Error))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directives(LogLevel::Info)))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Install the global subscriber with a custom filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    chute_bundler::init_logging(filter, !no_color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_cover_every_crate() {
        assert_eq!(
            directives(LogLevel::Debug),
            "chute=debug,chute_cli=debug,chute_bundler=debug,chute_config=debug"
        );
    }

    #[test]
    fn test_filters_build() {
        let _ = filter_for(true, false);
        let _ = filter_for(false, true);
        let _ = filter_for(false, false);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logger(false, true, true);
        init_logger(true, false, true);
    }
}
