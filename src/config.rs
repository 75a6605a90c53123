//! # Configuration Management
//!
//! Centralized configuration for the gateway.
//!
//! This module provides structured configuration for the server, the bundled
//! client, the token cache and logging, plus the wire-format constants.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Operational Notes
//! - The auth timeout bounds how long an unauthenticated peer may hold a socket
//! - The drain timeout bounds how long a close waits for in-flight writes
//! - `max_connections` is enforced at accept time

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Magic value every frame header must start with (`0x0000FF99`)
pub const MAGIC: u32 = 65433;

/// Fixed header length in bytes
pub const HEADER_LEN: usize = 28;

/// Width of one body segment in bytes
pub const SEGMENT_LEN: usize = 8;

/// End-of-frame marker
pub const DELIMITER: u8 = b'\n';

/// Smallest valid raw frame: header plus delimiter
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

/// Default bound on a raw frame (64 KB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Main network configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Token cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

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

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override fields from `GAME_GATEWAY_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("GAME_GATEWAY_SERVER_ADDRESS") {
            self.server.address = addr.clone();
            self.client.address = addr;
        }

        if let Ok(value) = std::env::var("GAME_GATEWAY_MAX_CONNECTIONS") {
            self.server.max_connections = parse_env("GAME_GATEWAY_MAX_CONNECTIONS", &value)?;
        }

        if let Ok(value) = std::env::var("GAME_GATEWAY_AUTH_TIMEOUT_MS") {
            let millis = parse_env("GAME_GATEWAY_AUTH_TIMEOUT_MS", &value)?;
            self.server.auth_timeout = Duration::from_millis(millis);
        }

        if let Ok(value) = std::env::var("GAME_GATEWAY_DRAIN_TIMEOUT_MS") {
            let millis = parse_env("GAME_GATEWAY_DRAIN_TIMEOUT_MS", &value)?;
            self.server.drain_timeout = Duration::from_millis(millis);
        }

        if let Ok(value) = std::env::var("GAME_GATEWAY_LOG_LEVEL") {
            self.logging.log_level = value.parse::<Level>().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid GAME_GATEWAY_LOG_LEVEL: {value}"))
            })?;
        }

        Ok(())
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
        errors.extend(self.cache.validate());
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

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| ProtocolError::ConfigError(format!("Invalid {name}: {value}")))
}

/// When a session counts as authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthPolicy {
    /// Any structurally valid frame authenticates the session
    #[default]
    AnyFrame,
    /// Only a frame whose handler grants authentication does
    LoginCommand,
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:20001")
    pub address: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Grace period for a new connection to authenticate
    #[serde(with = "duration_serde")]
    pub auth_timeout: Duration,

    /// Upper bound on waiting for in-flight writes before a socket is closed
    #[serde(with = "duration_serde")]
    pub drain_timeout: Duration,

    /// Maximum raw frame size in bytes, delimiter included
    pub max_frame_size: usize,

    /// Authentication policy
    pub auth_policy: AuthPolicy,

    /// Reject frames whose declared length disagrees with the bytes read
    pub strict_length: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:20001"),
            max_connections: 1000,
            auth_timeout: timeout::AUTH_TIMEOUT,
            drain_timeout: timeout::DRAIN_TIMEOUT,
            max_frame_size: MAX_FRAME_SIZE,
            auth_policy: AuthPolicy::AnyFrame,
            strict_length: false,
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
                "Invalid server address format: '{}' (expected format: '0.0.0.0:20001')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.auth_timeout.as_millis() < 100 {
            errors.push("Auth timeout too short (minimum: 100ms)".to_string());
        } else if self.auth_timeout.as_secs() > 300 {
            errors.push("Auth timeout too long (maximum: 300s)".to_string());
        }

        if self.drain_timeout.as_millis() < 100 {
            errors.push("Drain timeout too short (minimum: 100ms)".to_string());
        } else if self.drain_timeout.as_secs() > 60 {
            errors.push("Drain timeout too long (maximum: 60s)".to_string());
        }

        if self.max_frame_size < MIN_FRAME_LEN {
            errors.push(format!(
                "Max frame size too small: {} (minimum: {MIN_FRAME_LEN} bytes)",
                self.max_frame_size
            ));
        } else if self.max_frame_size > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 16 MB)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target server address
    pub address: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for waiting for response frames
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:20001"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            response_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: '127.0.0.1:20001')",
                self.address
            ));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Token cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached tokens
    pub max_entries: usize,

    /// Lifetime of an issued token
    #[serde(with = "duration_serde")]
    pub token_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_entries == 0 {
            errors.push("Cache max entries must be greater than 0".to_string());
        }

        if self.token_ttl.as_secs() < 1 {
            errors.push("Token TTL too short (minimum: 1s)".to_string());
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

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("game-gateway"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
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

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
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
