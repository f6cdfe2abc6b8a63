//! Tracing subscriber setup for the CLI

use crate::config::LoggingConfig;
use crate::error::{EngineError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG`, when set, overrides `config.level`. A subscriber that is
/// already installed is left in place.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EngineError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.colored)
        .with_target(false)
        .with_writer(std::io::stderr);

    // each format/timestamp combination is a distinct subscriber type
    let installed = match (config.format.as_str(), config.timestamps) {
        ("json", true) => builder.json().try_init(),
        ("json", false) => builder.json().without_time().try_init(),
        ("pretty", true) => builder.pretty().try_init(),
        ("pretty", false) => builder.pretty().without_time().try_init(),
        ("compact", true) => builder.compact().try_init(),
        ("compact", false) => builder.compact().without_time().try_init(),
        (other, _) => {
            return Err(EngineError::config(format!(
                "Unknown log format '{}', expected compact, pretty or json",
                other
            )))
        }
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}
