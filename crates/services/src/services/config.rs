//! Environment-driven configuration.

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {message}")]
    Invalid {
        var: &'static str,
        message: String,
    },
}

/// External object store connection settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub service_key: SecretString,
    pub bucket: String,
}

/// External AI analysis endpoint settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub endpoint_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    pub ai: AiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_or("PORT", "8080");
        let port = port.parse().map_err(|e| ConfigError::Invalid {
            var: "PORT",
            message: format!("{e}"),
        })?;

        Ok(Self {
            database_url: env_or("DATABASE_URL", "sqlite://data-combat.db"),
            host: env_or("HOST", "127.0.0.1"),
            port,
            storage: StorageConfig {
                base_url: require("STORAGE_URL")?,
                service_key: SecretString::from(require("STORAGE_SERVICE_KEY")?),
                bucket: env_or("STORAGE_BUCKET", "project-files"),
            },
            ai: AiConfig {
                endpoint_url: require("AI_ANALYZE_URL")?,
            },
        })
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var))
}
