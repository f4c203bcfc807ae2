//! Daemon configuration.
//!
//! Settings come from, in increasing priority: built-in defaults, an optional
//! TOML file, the `RELAY_BIND` environment variable, and command-line flags
//! (applied by the binary).
//!
//! ```toml
//! bind = "0.0.0.0:12345"
//! max_line_length = 65536
//! console = true
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::server::DEFAULT_MAX_LINE_LENGTH;

/// Environment variable that overrides the bind address.
pub const BIND_ENV_VAR: &str = "RELAY_BIND";

/// Relay daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the listener binds.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Inbound lines longer than this many bytes are dropped.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Whether to run the operator console on stdin.
    #[serde(default = "default_console")]
    pub console: bool,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 12345))
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_console() -> bool {
    true
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_line_length: default_max_line_length(),
            console: default_console(),
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read and
    /// `ConfigError::Parse` if it is not valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the bind address with a textual `host:port`.
    pub fn with_bind_override(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.bind = parse_bind(raw)?;
        Ok(self)
    }

    /// Applies `RELAY_BIND` if it is set and non-empty.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        match std::env::var(BIND_ENV_VAR) {
            Ok(raw) if !raw.trim().is_empty() => self.with_bind_override(&raw),
            _ => Ok(self),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::InvalidMaxLineLength);
        }
        Ok(())
    }
}

/// Parses a `host:port` bind address.
pub fn parse_bind(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidBind(raw.to_string()))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Invalid bind address {0:?} (expected host:port)")]
    InvalidBind(String),

    #[error("max_line_length must be greater than zero")]
    InvalidMaxLineLength,
}
