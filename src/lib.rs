//! Startup helpers shared by the `netpreseed` and `netpreseed-render`
//! binaries.

use anyhow::{Context, Result};
use netpreseed_core::config::{LogFormat, LoggingConfig};
use netpreseed_core::AppConfig;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Loads the configuration file (missing file means defaults) with
/// environment overrides, then applies command line overrides.
pub fn load_config(
    path: &Path,
    bind: Option<SocketAddr>,
    log_level: Option<&str>,
) -> Result<AppConfig> {
    let mut config = AppConfig::from_config_builder(path, false)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    if let Some(addr) = bind {
        config.server.host = addr.ip().to_string();
        config.server.port = addr.port();
    }
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Installs the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
pub fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
