//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, LogFormat},
    error::{Error, Result},
};

/// Install the process-wide tracing subscriber.
///
/// Called once at startup. The filter comes from `config.log.level` and falls
/// back to `info` when the directive does not parse.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = build_filter(&config.log.level);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.log.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.map_err(|e| Error::Logging(e.to_string()))?;

    tracing::debug!(level = %config.log.level, format = ?config.log.format, "Tracing initialized");

    Ok(())
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
