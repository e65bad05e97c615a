//! Structured logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Install a global `tracing` subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Returns `Ok(false)`
/// when a subscriber was already installed or console logging is disabled.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    if !config.log_to_console {
        return Ok(false);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level.as_str().to_ascii_lowercase())
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid log filter: {e}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::info!(app = %config.app_name, "Logging initialized");
    }
    Ok(installed)
}
