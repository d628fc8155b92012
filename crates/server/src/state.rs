//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use debate_agent_agent::DebateAgent;
use debate_agent_config::Settings;
use debate_agent_llm::ProviderChain;
use debate_agent_persistence::{InMemorySessionStore, SessionPolicy, SessionStore};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub agent: Arc<DebateAgent>,
    /// Prometheus handle when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// State over `store` with providers built from the settings
    pub fn new(config: Settings, store: Arc<dyn SessionStore>) -> Self {
        let providers = ProviderChain::from_settings(&config.llm);
        let agent = DebateAgent::from_settings(&config, store, providers);
        Self::with_agent(config, agent)
    }

    /// In-memory store sized from the settings
    pub fn in_memory(config: Settings) -> Self {
        let store = Arc::new(InMemorySessionStore::new(SessionPolicy::from(&config.conversation)));
        Self::new(config, store)
    }

    pub fn with_agent(config: Settings, agent: DebateAgent) -> Self {
        Self {
            config: Arc::new(config),
            agent: Arc::new(agent),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
