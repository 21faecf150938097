//! Structured logging with tracing
//!
//! Centralized subscriber setup: level filter from the `STRATUM_LOG`
//! environment variable (falling back to the configured level), JSON or
//! human-readable output, and an optional daily-rolling file appender.

use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use stratum_domain::constants::ENV_LOG_FILTER;
use stratum_domain::error::{Error, Result};

pub use crate::config::LoggingConfig;

/// Initialize the global subscriber from the provided configuration
///
/// Safe to call once per process; a second call reports a configuration
/// error instead of panicking.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter =
        EnvFilter::try_from_env(ENV_LOG_FILTER).unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_appender = config.file_output.as_ref().map(|path| {
        tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| std::path::Path::new(".")),
            path.file_stem()
                .unwrap_or_else(|| std::ffi::OsStr::new("stratum")),
        )
    });

    // json and pretty layers are distinct types, so the branches duplicate.
    let init_result = if config.json_format {
        let stdout = fmt::layer().json().with_target(true);
        let registry = Registry::default().with(filter);
        match file_appender {
            Some(appender) => {
                let file = fmt::layer().json().with_writer(appender).with_ansi(false);
                registry.with(stdout).with(file).try_init()
            }
            None => registry.with(stdout).try_init(),
        }
    } else {
        let stdout = fmt::layer().with_target(true);
        let registry = Registry::default().with(filter);
        match file_appender {
            Some(appender) => {
                let file = fmt::layer().with_writer(appender).with_ansi(false);
                registry.with(stdout).with(file).try_init()
            }
            None => registry.with(stdout).try_init(),
        }
    };

    init_result.map_err(|e| {
        Error::configuration("logging subscriber is already initialized")
            .with_source(e)
            .with_component("logging")
            .with_operation("init")
    })?;

    info!(%level, "logging initialized");
    Ok(())
}

/// Parse a log level string
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(Error::configuration(format!(
            "Invalid log level: {level}. Use trace, debug, info, warn, or error"
        ))
        .with_component("logging")),
    }
}
