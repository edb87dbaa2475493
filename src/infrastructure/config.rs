//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial {0}ms must not exceed maximum {1}ms"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid sweep interval: {0}ms. Must be at least 100ms")]
    InvalidSweepInterval(u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .metronome/config.yaml (project config)
    /// 3. .metronome/local.yaml (local overrides, optional)
    /// 4. Environment variables (METRONOME_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".metronome/config.yaml"))
            .merge(Yaml::file(".metronome/local.yaml"))
            .merge(Env::prefixed("METRONOME_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.broker.publish_max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(
                config.broker.publish_max_attempts,
            ));
        }
        if config.broker.publish_initial_backoff_ms > config.broker.publish_max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.broker.publish_initial_backoff_ms,
                config.broker.publish_max_backoff_ms,
            ));
        }

        if config.reminders.delivery_max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(
                config.reminders.delivery_max_attempts,
            ));
        }
        if config.reminders.delivery_initial_backoff_ms > config.reminders.delivery_max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.reminders.delivery_initial_backoff_ms,
                config.reminders.delivery_max_backoff_ms,
            ));
        }
        if config.reminders.sweep_interval_ms < 100 {
            return Err(ConfigError::InvalidSweepInterval(
                config.reminders.sweep_interval_ms,
            ));
        }

        if config.broadcaster.max_connections_per_user == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_connections_per_user must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
