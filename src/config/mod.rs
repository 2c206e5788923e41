//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `CALLFLOW` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use callflow::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod classifier;
mod error;
mod flows;
mod redis;
mod server;

pub use classifier::ClassifierConfig;
pub use error::{ConfigError, ConfigValidationError};
pub use flows::FlowStoreConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, REST port, WS port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Session store configuration (Redis)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Remote classifier configuration; absent credentials select the
    /// deterministic pattern fallback
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Flow persistence configuration (editing surface only)
    #[serde(default)]
    pub flows: FlowStoreConfig,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads environment variables with the `CALLFLOW` prefix
    /// 3. Uses `__` to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `CALLFLOW__SERVER__PORT=3000` -> `server.port = 3000`
    /// - `CALLFLOW__REDIS__URL=redis://...` -> `redis.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when values cannot be parsed into the
    /// expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CALLFLOW")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.server.validate()?;
        self.redis.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}
