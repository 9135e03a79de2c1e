//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Bearer-token verification configuration.
    pub auth: AuthConfig,
    /// Identity/room store configuration.
    pub database: Option<DatabaseConfig>,
    /// Connection timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "shutterd.straylight.net").
    pub name: String,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind the WebSocket listener to (e.g., "0.0.0.0:8090").
    pub address: SocketAddr,
    /// Allowed Origin headers for browser clients. Empty list allows all.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

/// Bearer-token verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to verify HMAC-SHA256 signed bearer tokens.
    /// Must match the secret the token-issuing service signs with.
    pub token_secret: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    pub path: String,
}

/// Connection timeout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Seconds a connection may stay silent before it is treated as
    /// disconnected. Clients keep the connection alive with `ping`.
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,
}

fn default_idle_secs() -> u64 {
    60
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            idle_secs: default_idle_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
