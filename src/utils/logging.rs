//! Structured logging setup.
//!
//! The library itself only emits `tracing` events. Binaries call
//! [`init_logging`] once at startup; `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
