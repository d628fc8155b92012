//! Ordered provider failover
//!
//! [`ProviderChain::complete`] tries each backend in configuration order and
//! returns the first non-empty completion. Errors, timeouts and empty
//! answers move on to the next backend. All attempts share one deadline, so
//! the chain as a whole never runs longer than its budget. When every
//! backend fails, none is configured, or the budget runs out, the chain
//! returns [`Completion::Unavailable`]; it never returns an error. What to
//! say instead is the caller's decision.

use std::sync::Arc;
use std::time::{Duration, Instant};

use debate_agent_config::LlmSettings;

use crate::backend::LlmBackend;
use crate::factory::{LlmFactory, LlmProviderConfig};
use crate::prompt::Message;
use crate::LlmError;

/// Outcome of a completion attempt across the chain
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// A backend produced text
    Text {
        text: String,
        /// Model name of the backend that answered
        provider: String,
        latency_ms: u64,
    },
    /// No backend produced usable text
    Unavailable,
}

impl Completion {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Completion::Unavailable)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Completion::Text { text, .. } => Some(text),
            Completion::Unavailable => None,
        }
    }
}

/// Reachability of one backend, for health reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub model: String,
    pub available: bool,
}

/// Backends in failover order
#[derive(Clone, Default)]
pub struct ProviderChain {
    backends: Vec<Arc<dyn LlmBackend>>,
}

impl ProviderChain {
    pub fn new(backends: Vec<Arc<dyn LlmBackend>>) -> Self {
        Self { backends }
    }

    /// A chain with no backends; every completion is unavailable
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from settings, skipping providers that cannot be constructed
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let mut backends = Vec::with_capacity(settings.providers.len());

        for provider in &settings.providers {
            let built = LlmProviderConfig::from_settings(provider, timeout)
                .and_then(|config| LlmFactory::create_backend(&config));
            match built {
                Ok(backend) => {
                    tracing::info!(
                        provider = %provider.provider,
                        model = %backend.model_name(),
                        "Registered completion provider"
                    );
                    backends.push(backend);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.provider,
                        error = %e,
                        "Skipping misconfigured completion provider"
                    );
                }
            }
        }

        Self { backends }
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|b| b.model_name().to_string())
            .collect()
    }

    /// Try each backend in order
    ///
    /// Each attempt is bounded by `attempt_timeout` and by whatever is left
    /// of `budget`, which covers the whole chain.
    pub async fn complete(
        &self,
        messages: &[Message],
        attempt_timeout: Duration,
        budget: Duration,
    ) -> Completion {
        let deadline = Instant::now() + budget;

        for (index, backend) in self.backends.iter().enumerate() {
            let start = Instant::now();
            let remaining = deadline.saturating_duration_since(start);
            if remaining.is_zero() {
                tracing::warn!(
                    skipped = self.backends.len() - index,
                    budget_ms = budget.as_millis() as u64,
                    "Provider budget exhausted"
                );
                break;
            }

            let bound = attempt_timeout.min(remaining);
            let outcome = match tokio::time::timeout(bound, backend.generate(messages)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout),
            };

            match outcome {
                Ok(result) if !result.text.trim().is_empty() => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    tracing::debug!(
                        model = %backend.model_name(),
                        position = index,
                        latency_ms,
                        tokens = result.tokens,
                        "Completion succeeded"
                    );
                    return Completion::Text {
                        text: result.text.trim().to_string(),
                        provider: backend.model_name().to_string(),
                        latency_ms,
                    };
                }
                Ok(_) => {
                    tracing::warn!(
                        model = %backend.model_name(),
                        position = index,
                        "Provider returned an empty completion"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        model = %backend.model_name(),
                        position = index,
                        error = %e,
                        "Provider failed, trying next"
                    );
                }
            }
        }

        Completion::Unavailable
    }

    /// Probe every backend
    pub async fn status(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            statuses.push(ProviderStatus {
                model: backend.model_name().to_string(),
                available: backend.is_available().await,
            });
        }
        statuses
    }
}
