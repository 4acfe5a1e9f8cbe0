//! Logging setup for binaries and tests embedding chute-bundler.
//!
//! Only compiled with the `logging` feature. The library itself only emits
//! `tracing` events; installing a subscriber is the caller's business.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log level for chute output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// No logging output
    Silent,
    Error,
    Warn,
    /// Errors, warnings and one line per emitted asset (default)
    #[default]
    Info,
    /// Adds per-module dispatch decisions
    Debug,
    /// Adds every stage invocation
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("Invalid log level: {other}")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// Install a global subscriber writing compact lines to stderr. Only the
/// first call in a process has an effect; later calls keep that subscriber.
///
/// ```rust,no_run
/// use chute_bundler::logging::{LogLevel, init_logging};
/// use tracing_subscriber::EnvFilter;
///
/// init_logging(EnvFilter::new(LogLevel::Debug.to_string()), true);
/// ```
pub fn init_logging(filter: EnvFilter, ansi: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
