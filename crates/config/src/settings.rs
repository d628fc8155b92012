//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Provider names accepted in `llm.providers[].provider`
pub const KNOWN_PROVIDERS: &[&str] = &[
    "openai",
    "gpt",
    "azure",
    "azure-openai",
    "ollama",
    "local",
];

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session retention and history bounds
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Session store backend
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Language model providers, in failover order
    #[serde(default)]
    pub llm: LlmSettings,

    /// Analysis, annotation and topic registry
    #[serde(default)]
    pub persuasion: PersuasionConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Longest accepted user message, in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_request_timeout() -> u64 {
    60
}
fn default_max_message_length() -> usize {
    2000
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_message_length: default_max_message_length(),
        }
    }
}

/// Conversation retention and history bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Idle time after which a session is treated as missing
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum (user, bot) pairs kept per session
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,

    /// Prior pairs included in the provider prompt
    #[serde(default = "default_prompt_history_pairs")]
    pub prompt_history_pairs: usize,

    /// Interval of the in-memory expiry sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    3600
}
fn default_max_pairs() -> usize {
    5
}
fn default_prompt_history_pairs() -> usize {
    2
}
fn default_sweep_interval() -> u64 {
    300
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_pairs: default_max_pairs(),
            prompt_history_pairs: default_prompt_history_pairs(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Session store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix of session keys (`{prefix}:{id}`)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn default_key_prefix() -> String {
    "conversation".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// One configured language model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider kind (see [`KNOWN_PROVIDERS`])
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Azure API version, only for azure providers
    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_max_tokens() -> usize {
    150
}
fn default_temperature() -> f32 {
    0.7
}

impl ProviderSettings {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: "openai".to_string(),
            model: default_model(),
            endpoint: None,
            api_key: Some(api_key.into()),
            api_version: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Providers in failover order; empty means fallback-only mode
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSettings>,

    /// Per-attempt timeout for a completion
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,

    /// Total time all providers together may spend on one reply. Must stay
    /// below `server.request_timeout_seconds` so a hung provider ends in a
    /// fallback rebuttal rather than a request timeout.
    #[serde(default = "default_llm_budget_ms")]
    pub budget_ms: u64,
}

fn default_providers() -> Vec<ProviderSettings> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(|key| vec![ProviderSettings::openai(key)])
        .unwrap_or_default()
}

fn default_llm_timeout_ms() -> u64 {
    20_000
}

fn default_llm_budget_ms() -> u64 {
    45_000
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            timeout_ms: default_llm_timeout_ms(),
            budget_ms: default_llm_budget_ms(),
        }
    }
}

/// Extra topic registry entry, appended after the built-in topics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicSettings {
    pub id: String,
    pub keywords: Vec<String>,
    /// Stance defended when a keyword matches
    pub stance: String,
}

/// Persuasion analysis and educational annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersuasionConfig {
    /// Append technique breakdowns to some replies
    #[serde(default = "default_true")]
    pub educational_mode: bool,

    /// Probability that a reply gets an annotation
    #[serde(default = "default_annotation_frequency")]
    pub annotation_frequency: f64,

    /// Fixed seed for the annotation coin; random when unset
    #[serde(default)]
    pub annotation_seed: Option<u64>,

    #[serde(default)]
    pub topics: Vec<TopicSettings>,
}

fn default_annotation_frequency() -> f64 {
    0.3
}

impl Default for PersuasionConfig {
    fn default() -> Self {
        Self {
            educational_mode: true,
            annotation_frequency: default_annotation_frequency(),
            annotation_seed: None,
            topics: Vec::new(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    /// Parse settings from a YAML document and validate them
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_conversation()?;
        self.validate_llm()?;
        self.validate_persuasion()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.max_message_length < 10 {
            return Err(invalid(
                "server.max_message_length",
                format!("Must be at least 10, got {}", self.server.max_message_length),
            ));
        }
        if self.server.request_timeout_seconds == 0 {
            return Err(invalid("server.request_timeout_seconds", "Must be positive"));
        }
        Ok(())
    }

    fn validate_conversation(&self) -> Result<(), ConfigError> {
        let conversation = &self.conversation;

        if conversation.ttl_seconds < 60 {
            return Err(invalid(
                "conversation.ttl_seconds",
                format!("Must be at least 60 seconds, got {}", conversation.ttl_seconds),
            ));
        }

        if conversation.max_pairs == 0 {
            return Err(invalid("conversation.max_pairs", "Must keep at least one pair"));
        }

        if conversation.prompt_history_pairs == 0
            || conversation.prompt_history_pairs > conversation.max_pairs
        {
            return Err(invalid(
                "conversation.prompt_history_pairs",
                format!(
                    "Must be between 1 and max_pairs ({}), got {}",
                    conversation.max_pairs, conversation.prompt_history_pairs
                ),
            ));
        }

        if conversation.sweep_interval_seconds == 0 {
            return Err(invalid("conversation.sweep_interval_seconds", "Must be positive"));
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.timeout_ms == 0 {
            return Err(invalid("llm.timeout_ms", "Must be positive"));
        }
        if self.llm.budget_ms == 0 {
            return Err(invalid("llm.budget_ms", "Must be positive"));
        }
        let request_ms = self.server.request_timeout_seconds.saturating_mul(1000);
        if self.llm.budget_ms >= request_ms {
            return Err(invalid(
                "llm.budget_ms",
                format!(
                    "Must be below server.request_timeout_seconds ({} ms), got {}",
                    request_ms, self.llm.budget_ms
                ),
            ));
        }

        for (index, provider) in self.llm.providers.iter().enumerate() {
            let kind = provider.provider.to_lowercase();
            if !KNOWN_PROVIDERS.contains(&kind.as_str()) {
                return Err(invalid(
                    &format!("llm.providers[{}].provider", index),
                    format!("Unknown provider '{}'", provider.provider),
                ));
            }
            if !(0.0..=2.0).contains(&provider.temperature) {
                return Err(invalid(
                    &format!("llm.providers[{}].temperature", index),
                    format!("Must be between 0.0 and 2.0, got {}", provider.temperature),
                ));
            }
        }

        Ok(())
    }

    fn validate_persuasion(&self) -> Result<(), ConfigError> {
        let frequency = self.persuasion.annotation_frequency;
        if !(0.0..=1.0).contains(&frequency) {
            return Err(invalid(
                "persuasion.annotation_frequency",
                format!("Must be between 0.0 and 1.0, got {}", frequency),
            ));
        }

        for topic in &self.persuasion.topics {
            if topic.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(invalid(
                    &format!("persuasion.topics.{}", topic.id),
                    "Topic needs at least one keyword",
                ));
            }
            if topic.stance.trim().is_empty() {
                return Err(invalid(
                    &format!("persuasion.topics.{}", topic.id),
                    "Topic stance must not be empty",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Load settings from `config/` relative to the working directory
///
/// Priority (highest to lowest):
/// 1. Environment variables (DEBATE_AGENT prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    build_settings(Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::FileNotFound(dir.display().to_string()));
    }
    build_settings(dir, env)
}

fn build_settings(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("DEBATE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
