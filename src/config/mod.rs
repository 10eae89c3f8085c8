//! Configuration management for boardlog
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use boardlog::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Moon API: {}", config.moon.api_url);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `BOARDLOG__<section>__<key>`
//!
//! Examples:
//! - `BOARDLOG__RETRY__MAX_ATTEMPTS=5`
//! - `BOARDLOG__HTTP__REQUEST_TIMEOUT=30s`
//! - `BOARDLOG__OUTPUT__GRADE_SCALE=hueco`
//!
//! The board password is read from `BOARDLOG_PASSWORD` (or a `.env` file) and
//! never from the configuration file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/boardlog.toml`.
//! This can be overridden using the `BOARDLOG_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    AuroraSettings, Config, HttpSettings, MoonSettings, OutputSettings, RetrySettings,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`BOARDLOG__*`)
    /// 2. TOML file (default: `config/boardlog.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation
    /// fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, including environment secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_with_secrets(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration built in code
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}
