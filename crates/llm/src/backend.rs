//! Chat completion backends
//!
//! [`OllamaBackend`] talks to a local Ollama server, [`OpenAIBackend`] to
//! OpenAI, Azure OpenAI or any server exposing `/chat/completions`. Replies
//! are short, so neither backend streams.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::prompt::Message;
use crate::LlmError;

/// Result of one completed generation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    /// Completion tokens, 0 when the server does not report usage
    pub tokens: usize,
    pub total_time_ms: u64,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
}

/// A chat model reachable over the network
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Cheap reachability probe used by the health endpoint
    async fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;
}

fn http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Map non-2xx responses to errors. 5xx counts as a network failure so it
/// can be retried.
async fn ensure_success(response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(LlmError::Network(format!("server returned {}: {}", status, body)))
    } else {
        Err(LlmError::Api(format!("HTTP {}: {}", status, body)))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Assistant message as returned by both APIs
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

// =============================================================================
// Ollama
// =============================================================================

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    /// Server root, without the `/api` suffix
    pub endpoint: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
    /// Extra attempts after a network failure
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further one
    pub initial_backoff: Duration,
    /// How long Ollama keeps the model loaded between calls
    pub keep_alive: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama3".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            top_p: 0.9,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            keep_alive: "5m".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config.timeout)?,
            config,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn chat_body<'a>(&'a self, messages: &'a [Message]) -> OllamaChatBody<'a> {
        OllamaChatBody {
            model: &self.config.model,
            messages,
            stream: false,
            keep_alive: &self.config.keep_alive,
            options: OllamaOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        }
    }

    async fn chat_once(&self, body: &OllamaChatBody<'_>) -> Result<OllamaChatReply, LlmError> {
        let response = self.client.post(self.api_url("/chat")).json(body).send().await?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let body = self.chat_body(messages);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.chat_once(&body).await {
                Ok(reply) => {
                    return Ok(GenerationResult {
                        text: reply.message.content,
                        tokens: reply.eval_count as usize,
                        total_time_ms: elapsed_ms(start),
                        finish_reason: if reply.done_reason.as_deref() == Some("length") {
                            FinishReason::Length
                        } else {
                            FinishReason::Stop
                        },
                    });
                }
                Err(e) if Self::is_retryable(&e) && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        model = %self.config.model,
                        error = %e,
                        attempt,
                        "Ollama request failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.api_url("/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    keep_alive: &'a str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaChatReply {
    message: ReplyMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    eval_count: u64,
}

// =============================================================================
// OpenAI-compatible
// =============================================================================

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// `https://api.openai.com/v1`, an Azure resource URL, or a local server
    pub endpoint: String,
    pub api_key: String,
    /// Model name, or the deployment name on Azure
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
    /// Set for Azure OpenAI, which routes by deployment and version
    pub api_version: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
            api_version: None,
        }
    }
}

impl OpenAIConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: deployment.into(),
            api_version: Some(api_version.into()),
            ..Default::default()
        }
    }

    fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }
}

pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
    headers: HeaderMap,
}

impl OpenAIBackend {
    /// A key is only optional for servers on localhost
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() && !config.endpoint.starts_with("http://localhost") {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let headers = Self::auth_headers(&config)?;
        Ok(Self {
            client: http_client(config.timeout)?,
            headers,
            config,
        })
    }

    fn auth_headers(config: &OpenAIConfig) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        if config.api_key.is_empty() {
            return Ok(headers);
        }

        let invalid = |_| LlmError::Configuration("API key is not a valid header value".to_string());
        if config.is_azure() {
            headers.insert("api-key", HeaderValue::from_str(&config.api_key).map_err(invalid)?);
        } else {
            let bearer = format!("Bearer {}", config.api_key);
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&bearer).map_err(invalid)?);
        }
        Ok(headers)
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn chat_url(&self) -> String {
        match &self.config.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url(),
                self.config.model,
                version
            ),
            None => format!("{}/chat/completions", self.base_url()),
        }
    }

    fn chat_body<'a>(&'a self, messages: &'a [Message]) -> OpenAIChatBody<'a> {
        OpenAIChatBody {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.chat_url())
            .headers(self.headers.clone())
            .json(&self.chat_body(messages))
            .send()
            .await?;
        let reply: OpenAIChatReply = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tokens = reply.usage.map(|u| u.completion_tokens).unwrap_or(0);
        let choice = reply
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        Ok(GenerationResult {
            text: choice.message.content,
            tokens,
            total_time_ms: elapsed_ms(start),
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        // Azure has no cheap per-deployment probe
        if self.config.is_azure() {
            return true;
        }
        let url = format!("{}/models", self.base_url());
        match self.client.get(url).headers(self.headers.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct OpenAIChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatReply {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    completion_tokens: usize,
}
