//! Server configuration

use serde::Deserialize;
use std::net::SocketAddr;

use super::error::ConfigValidationError;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// REST port
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket (live observer) port
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Environment name
    #[serde(default)]
    pub environment: Environment,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS allowed origins (comma-separated; enforced in production)
    #[serde(default)]
    pub cors_origins: Option<String>,
}

/// Application environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl ServerConfig {
    /// The REST socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// The WebSocket socket address.
    pub fn ws_socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.ws_port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Checks if running in production.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// CORS origins as a vector.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_ref()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    /// Validates server configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.port == 0 || self.ws_port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }
        if self.port == self.ws_port {
            return Err(ConfigValidationError::PortCollision);
        }
        if self.is_production() && self.cors_origins_list().is_empty() {
            return Err(ConfigValidationError::MissingCorsOrigins);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_port: default_ws_port(),
            environment: Environment::default(),
            log_level: default_log_level(),
            cors_origins: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ws_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "callflow=info".to_string()
}
