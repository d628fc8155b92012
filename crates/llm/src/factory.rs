//! Backend factory
//!
//! Turns a configured provider entry into a backend. Providers are chosen by
//! configuration only; nothing is probed at startup.
//!
//! ```ignore
//! let config = LlmProviderConfig::ollama("llama3").with_endpoint("http://gpu-box:11434");
//! let backend = LlmFactory::create_backend(&config)?;
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use debate_agent_config::ProviderSettings;

use crate::backend::{LlmBackend, OllamaBackend, OllamaConfig, OpenAIBackend, OpenAIConfig};
use crate::LlmError;

const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAI,
    AzureOpenAI,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAI => "openai",
            LlmProvider::AzureOpenAI => "azure",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Ok(LlmProvider::Ollama),
            "openai" | "gpt" => Ok(LlmProvider::OpenAI),
            "azure" | "azure-openai" => Ok(LlmProvider::AzureOpenAI),
            other => Err(LlmError::Configuration(format!("Unknown provider '{}'", other))),
        }
    }
}

/// Provider-neutral backend configuration
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    pub model: String,
    /// Overrides the provider's default endpoint; required for Azure
    pub endpoint: Option<String>,
    /// Falls back to `OPENAI_API_KEY` for OpenAI
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    /// HTTP timeout of a single request
    pub timeout: Duration,
}

impl LlmProviderConfig {
    fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            endpoint: None,
            api_key: None,
            api_version: None,
            max_tokens: 150,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn ollama(model: impl Into<String>) -> Self {
        Self::with_provider(LlmProvider::Ollama, model)
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::with_provider(LlmProvider::OpenAI, model)
        }
    }

    pub fn from_settings(settings: &ProviderSettings, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            provider: settings.provider.parse()?,
            model: settings.model.clone(),
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            api_version: settings.api_version.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            model: self.model.clone(),
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_ENDPOINT.to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            ..Default::default()
        }
    }

    fn openai_config(&self) -> OpenAIConfig {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        let mut config = OpenAIConfig::openai(api_key, &self.model);
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        self.apply_sampling(config)
    }

    fn azure_config(&self) -> Result<OpenAIConfig, LlmError> {
        let missing = |field: &str| LlmError::Configuration(format!("Azure OpenAI requires {}", field));
        let endpoint = self.endpoint.clone().ok_or_else(|| missing("endpoint"))?;
        let api_key = self.api_key.clone().ok_or_else(|| missing("api_key"))?;
        let version = self
            .api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());

        Ok(self.apply_sampling(OpenAIConfig::azure(endpoint, api_key, &self.model, version)))
    }

    fn apply_sampling(&self, config: OpenAIConfig) -> OpenAIConfig {
        OpenAIConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            ..config
        }
    }
}

pub struct LlmFactory;

impl LlmFactory {
    pub fn create_backend(config: &LlmProviderConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
        let backend: Arc<dyn LlmBackend> = match config.provider {
            LlmProvider::Ollama => Arc::new(OllamaBackend::new(config.ollama_config())?),
            LlmProvider::OpenAI => Arc::new(OpenAIBackend::new(config.openai_config())?),
            LlmProvider::AzureOpenAI => Arc::new(OpenAIBackend::new(config.azure_config()?)?),
        };
        Ok(backend)
    }
}
