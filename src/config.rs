//! # Configuration Management
//!
//! Centralized configuration for the sign-in client.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! Durations are written as milliseconds and log levels as lowercase names.

use crate::core::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Command;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Largest frame size that passes validation (16 MiB)
pub const MAX_FRAME_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Smallest frame size that passes validation
pub const MIN_FRAME_SIZE_LIMIT: usize = 16;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SigninConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SigninConfig {
    /// Read and parse a TOML file. Missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("invalid TOML: {e}")))
    }

    /// Defaults overlaid with `IM_SIGNIN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("IM_SIGNIN_SERVER_URL") {
            config.client.server_url = url;
        }
        if let Some(millis) = lookup("IM_SIGNIN_CONNECT_TIMEOUT_MS") {
            config.client.connect_timeout =
                Duration::from_millis(parse_var("IM_SIGNIN_CONNECT_TIMEOUT_MS", &millis)?);
        }
        if let Some(wrap) = lookup("IM_SIGNIN_WRAP_ENVELOPE") {
            config.client.wrap_in_envelope = parse_var("IM_SIGNIN_WRAP_ENVELOPE", &wrap)?;
        }
        if let Some(level) = lookup("IM_SIGNIN_LOG_LEVEL") {
            config.logging.log_level = parse_var("IM_SIGNIN_LOG_LEVEL", &level)?;
        }

        Ok(config)
    }

    /// Defaults with `mutator` applied.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// The default configuration rendered as TOML, for seeding a config file.
    pub fn example_config() -> String {
        Self::default().to_toml().unwrap_or_default()
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| config_error(format!("cannot serialize: {e}")))
    }

    /// Write the configuration to `path` as TOML.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml()?)
            .map_err(|e| config_error(format!("cannot write {}: {e}", path.display())))
    }

    /// Validate the configuration. An empty list means it is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Like [`validate`](Self::validate), folding every problem into one error.
    pub fn validate_strict(&self) -> Result<()> {
        match self.validate().as_slice() {
            [] => Ok(()),
            problems => Err(config_error(format!(
                "{} invalid setting(s): {}",
                problems.len(),
                problems.join("; ")
            ))),
        }
    }
}

fn config_error(message: String) -> ProtocolError {
    ProtocolError::ConfigError(message)
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| config_error(format!("{key}={value:?}: {e}")))
}

/// Sign-in client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway URL (`ws://`, `wss://` or `tcp://`)
    pub server_url: String,

    /// Bound on the transport open; the only timer the session arms
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Wrap the sign-in request in a packet envelope before sending
    pub wrap_in_envelope: bool,

    /// Command number used for the envelope
    pub sign_in_command: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::from("ws://127.0.0.1:8080/ws"),
            connect_timeout: timeout::CONNECT_TIMEOUT,
            wrap_in_envelope: true,
            sign_in_command: Command::SIGN_IN,
        }
    }
}

impl ClientConfig {
    /// Problems with these settings; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_url.is_empty() {
            errors.push("Server URL cannot be empty".to_string());
        } else if !["ws://", "wss://", "tcp://"]
            .iter()
            .any(|scheme| self.server_url.starts_with(scheme))
        {
            errors.push(format!(
                "Invalid server URL: '{}' (expected ws://, wss:// or tcp://)",
                self.server_url
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 300 {
            errors.push("Connect timeout too long (maximum: 300s)".to_string());
        }

        if self.wrap_in_envelope && self.sign_in_command == 0 {
            errors.push(
                "Sign-in command must be non-zero when wrap_in_envelope is enabled".to_string(),
            );
        }

        errors
    }
}

/// Transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Largest inbound or outbound frame in bytes
    pub max_frame_size: usize,

    /// Capacity of the per-connection outbound and event queues
    pub outbound_queue: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_queue: 32,
        }
    }
}

impl TransportConfig {
    /// Problems with these settings; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size < MIN_FRAME_SIZE_LIMIT {
            errors.push(format!(
                "Max frame size too small: {} bytes (minimum: {MIN_FRAME_SIZE_LIMIT})",
                self.max_frame_size
            ));
        } else if self.max_frame_size > MAX_FRAME_SIZE_LIMIT {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 16 MiB)",
                self.max_frame_size
            ));
        }

        if self.outbound_queue == 0 {
            errors.push("Outbound queue must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Fallback level when `RUST_LOG` is not set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("im-signin"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Problems with these settings; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Durations as whole milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Log levels as lowercase names (`"info"`, `"debug"`, ...).
mod log_level_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Level>()
            .map_err(|_| D::Error::custom(format!("unknown log level `{name}`")))
    }
}
