//! Language model integration
//!
//! Features:
//! - OpenAI-compatible and Ollama backends
//! - Config-driven backend factory
//! - Ordered failover chain that never fails, returning
//!   [`Completion::Unavailable`] when no backend produced text

pub mod backend;
pub mod chain;
pub mod factory;
pub mod prompt;

pub use backend::{
    FinishReason, GenerationResult, LlmBackend, OllamaConfig, OllamaBackend, OpenAIBackend,
    OpenAIConfig,
};
pub use chain::{Completion, ProviderChain, ProviderStatus};
pub use factory::{LlmFactory, LlmProvider, LlmProviderConfig};
pub use prompt::{Message, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
