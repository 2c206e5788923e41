//! Configuration error types

use thiserror::Error;

/// Errors that occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors that occur while validating configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error("Port must be non-zero")]
    InvalidPort,

    #[error("REST and WebSocket ports must differ")]
    PortCollision,

    #[error("CORS origins are required in production")]
    MissingCorsOrigins,

    #[error("Redis URL must use the redis:// or rediss:// scheme")]
    InvalidRedisUrl,

    #[error("Classifier URL must use http:// or https://")]
    InvalidClassifierUrl,
}
