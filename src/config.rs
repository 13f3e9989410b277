//! # Configuration Management
//!
//! Centralized configuration for servers and clients: listen and target
//! addresses, the hello timeout, framing mode, the pre-shared cipher key, the
//! token freshness window and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Security Considerations
//! - Token framing is the default; plain framing is an explicit opt-out
//! - The default cipher key is a placeholder and must be replaced in production
//! - A short freshness window limits how long a captured envelope stays replayable

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max allowed payload size (e.g. 16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Placeholder pre-shared key for local development
pub const DEFAULT_CIPHER_KEY: &str = "change-me";

/// Main network configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("GAME_TRANSPORT_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(addr) = std::env::var("GAME_TRANSPORT_CLIENT_ADDRESS") {
            config.client.address = addr;
        }

        if let Ok(timeout) = std::env::var("GAME_TRANSPORT_HELLO_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.hello_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(mode) = std::env::var("GAME_TRANSPORT_AUTHENTICATION") {
            config.transport.authentication = match mode.to_ascii_lowercase().as_str() {
                "token" => AuthenticationMode::Token,
                "none" => AuthenticationMode::None,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid authentication mode: '{other}' (expected 'token' or 'none')"
                    )))
                }
            };
        }

        if let Ok(key) = std::env::var("GAME_TRANSPORT_CIPHER_KEY") {
            config.transport.cipher_key = key;
        }

        if let Ok(freshness) = std::env::var("GAME_TRANSPORT_TOKEN_FRESHNESS_MS") {
            if let Ok(val) = freshness.parse::<u64>() {
                config.transport.token_freshness = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "0.0.0.0:5555")
    pub address: String,

    /// How long an accepted connection may wait before sending hello
    #[serde(with = "duration_serde")]
    pub hello_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:5555"),
            hello_timeout: timeout::HELLO_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:5555')",
                self.address
            ));
        }

        if self.hello_timeout.as_millis() < 10 {
            errors.push("Hello timeout too short (minimum: 10ms)".to_string());
        } else if self.hello_timeout.as_secs() > 3600 {
            errors.push("Hello timeout too long (maximum: 1 hour)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address
    pub address: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:5555"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Envelope framing selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMode {
    /// Every envelope carries an encrypted, time-stamped identity token
    #[default]
    Token,
    /// Alias + length + payload only; the peer's identity is not proven
    None,
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Envelope framing mode
    pub authentication: AuthenticationMode,

    /// Pre-shared passphrase the token cipher key is derived from
    pub cipher_key: String,

    /// Maximum accepted token age
    #[serde(with = "duration_serde")]
    pub token_freshness: Duration,

    /// Maximum allowed payload size in bytes
    pub max_payload_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            authentication: AuthenticationMode::Token,
            cipher_key: String::from(DEFAULT_CIPHER_KEY),
            token_freshness: timeout::TOKEN_FRESHNESS,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > i32::MAX as usize {
            errors.push(format!(
                "Max payload size too large: {} bytes (wire limit: {} bytes)",
                self.max_payload_size,
                i32::MAX
            ));
        }

        match self.authentication {
            AuthenticationMode::Token => {
                if self.cipher_key.is_empty() {
                    errors.push("Cipher key cannot be empty with token authentication".to_string());
                }
                if self.token_freshness.as_millis() < 100 {
                    errors.push("Token freshness too short (minimum: 100ms)".to_string());
                } else if self.token_freshness.as_secs() > 3600 {
                    errors.push("Token freshness too long (maximum: 1 hour)".to_string());
                }
            }
            AuthenticationMode::None => {
                errors.push(
                    "WARNING: Token authentication is disabled - not recommended for production"
                        .to_string(),
                );
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("game-transport"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
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

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
