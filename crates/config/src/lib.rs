//! Configuration management for the debate agent
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (DEBATE_AGENT_ prefix, `__` separator)

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, ConversationConfig, LlmSettings, ObservabilityConfig,
    PersistenceConfig, PersuasionConfig, ProviderSettings, RuntimeEnvironment, ServerConfig,
    Settings, StoreBackend, TopicSettings, KNOWN_PROVIDERS,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(path) => ConfigError::MissingField(path),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
