//! Debate turn orchestration
//!
//! [`DebateAgent::handle_turn`] ties the pieces together: load or create the
//! session, freeze the stance on the first turn, ask the providers for a
//! reply, substitute a fallback rebuttal when there is none (or it concedes),
//! classify both messages, optionally annotate, and persist the exchange in
//! one atomic store update.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use debate_agent_config::Settings;
use debate_agent_core::{ConversationSession, DetectedTechnique, Exchange, Message};
use debate_agent_llm::{Completion, ProviderChain};
use debate_agent_persistence::{SessionStore, StoreError, StoreHealth};

use crate::annotation::{annotate, AnnotationPolicy};
use crate::catalog::TechniqueSummary;
use crate::fallback::{FallbackKind, FallbackRequest, FallbackTable};
use crate::guard::{check_reply, GuardVerdict};
use crate::persuasion::{ArgumentProfile, Demonstration, PersuasionAnalyzer};
use crate::prompt::PromptBuilder;
use crate::stance::StanceExtractor;
use crate::AgentError;

/// Time kept back from the request timeout for everything around the
/// provider call
const REQUEST_HEADROOM: Duration = Duration::from_millis(500);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Prior exchanges included in the provider prompt
    pub prompt_history_pairs: usize,
    /// Bound on each provider attempt
    pub provider_timeout: Duration,
    /// Bound on all provider attempts of one turn together
    pub provider_budget: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            prompt_history_pairs: 2,
            provider_timeout: Duration::from_secs(20),
            provider_budget: Duration::from_secs(45),
        }
    }
}

impl AgentConfig {
    /// The provider budget never reaches the HTTP request timeout, even when
    /// the settings were built without `validate`
    pub fn from_settings(settings: &Settings) -> Self {
        let request = Duration::from_secs(settings.server.request_timeout_seconds);
        let ceiling = request.saturating_sub(REQUEST_HEADROOM).max(request / 2);
        Self {
            prompt_history_pairs: settings.conversation.prompt_history_pairs,
            provider_timeout: Duration::from_millis(settings.llm.timeout_ms),
            provider_budget: Duration::from_millis(settings.llm.budget_ms).min(ceiling),
        }
    }
}

/// Where the bot message came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplySource {
    Provider { model: String, latency_ms: u64 },
    Fallback { kind: FallbackKind },
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider",
            Self::Fallback { .. } => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Result of one debate turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    /// Full bounded history after this turn, oldest first
    pub messages: Vec<Message>,
    pub reply: Message,
    pub topic: Option<String>,
    pub stance: Option<String>,
    pub source: ReplySource,
    pub annotated: bool,
    /// The turn was not persisted because the store was unreachable
    pub ephemeral: bool,
    pub latency_ms: u64,
}

/// Reply chosen before the store update
struct DraftReply {
    bot: Message,
    source: ReplySource,
    annotated: bool,
}

/// Stance-locked debate agent
pub struct DebateAgent {
    config: AgentConfig,
    store: Arc<dyn SessionStore>,
    providers: ProviderChain,
    analyzer: PersuasionAnalyzer,
    extractor: StanceExtractor,
    fallbacks: FallbackTable,
    annotations: AnnotationPolicy,
}

impl DebateAgent {
    /// Agent with built-in rules, default config and annotations per the
    /// default persuasion settings
    pub fn new(store: Arc<dyn SessionStore>, providers: ProviderChain) -> Self {
        Self {
            config: AgentConfig::default(),
            store,
            providers,
            analyzer: PersuasionAnalyzer::default(),
            extractor: StanceExtractor::builtin(),
            fallbacks: FallbackTable::builtin(),
            annotations: AnnotationPolicy::default(),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn SessionStore>,
        providers: ProviderChain,
    ) -> Self {
        Self::new(store, providers)
            .with_config(AgentConfig::from_settings(settings))
            .with_extractor(StanceExtractor::with_topics(&settings.persuasion.topics))
            .with_annotations(AnnotationPolicy::from_config(&settings.persuasion))
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_extractor(mut self, extractor: StanceExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_annotations(mut self, annotations: AnnotationPolicy) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// Handle one user turn
    ///
    /// Unknown or expired session ids start a new session. Provider failures
    /// never fail the turn. When the store is unreachable the turn is served
    /// from a non-persisted session flagged `ephemeral`.
    pub async fn handle_turn(
        &self,
        session_id: Option<&str>,
        user_message: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let started = Instant::now();
        let user_text = user_message.trim();
        if user_text.is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".to_string()));
        }

        let (session, mut ephemeral) = match self.store.get_or_create(session_id).await {
            Ok(session) => (session, false),
            Err(e) if e.is_unavailable() => {
                tracing::warn!(error = %e, "Session store unavailable, serving ephemeral session");
                (ConversationSession::generate(), true)
            }
            Err(e) => return Err(e.into()),
        };

        // The stance is decided once, from the opening message
        let (topic, stance) = if session.is_stance_resolved() {
            (session.topic.clone(), session.stance.clone())
        } else {
            let outcome = self.extractor.extract(user_text);
            tracing::info!(
                session_id = %session.id,
                topic = outcome.topic(),
                stance = ?outcome.stance(),
                "Stance frozen for new session"
            );
            let (topic, stance) = outcome.into_parts();
            (Some(topic), stance)
        };

        let profile = self.analyzer.profile(user_text);
        let user = Message::user(user_text).with_techniques(profile.techniques.clone());

        let messages = PromptBuilder::new()
            .system_prompt(topic.as_deref(), stance.as_deref())
            .with_strategy(&profile)
            .with_history(&session, self.config.prompt_history_pairs)
            .user_message(user_text)
            .build();

        let completion = self
            .providers
            .complete(&messages, self.config.provider_timeout, self.config.provider_budget)
            .await;

        let annotate_turn = self.annotations.should_annotate();
        let draft = self.draft_reply(
            completion,
            &session,
            topic.as_deref(),
            stance.as_deref(),
            user_text,
            &profile,
            annotate_turn,
        );

        let max_pairs = self.store.policy().max_pairs;
        let mutator = |stored: &mut ConversationSession| {
            if let Some(topic) = &topic {
                stored.freeze_stance(topic.clone(), stance.clone());
            }
            stored.push_exchange(Exchange::new(user.clone(), draft.bot.clone()), max_pairs);
        };

        let stored = if ephemeral {
            apply_locally(session, &mutator, max_pairs)
        } else {
            let updated = self.store.update(&session.id, &mutator).await;
            match updated {
                Ok(stored) => stored,
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(
                        session_id = %session.id,
                        error = %e,
                        "Session store unavailable on update, turn not persisted"
                    );
                    ephemeral = true;
                    apply_locally(session, &mutator, max_pairs)
                }
                Err(e) => return Err(e.into()),
            }
        };

        let outcome = TurnOutcome {
            session_id: stored.id.clone(),
            messages: stored.messages(),
            reply: draft.bot,
            topic: stored.topic.clone(),
            stance: stored.stance.clone(),
            source: draft.source,
            annotated: draft.annotated,
            ephemeral,
            latency_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            session_id = %outcome.session_id,
            source = outcome.source.as_str(),
            user_techniques = profile.techniques.len(),
            exchanges = stored.exchange_count(),
            ephemeral = outcome.ephemeral,
            latency_ms = outcome.latency_ms,
            "Turn handled"
        );

        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn draft_reply(
        &self,
        completion: Completion,
        session: &ConversationSession,
        topic: Option<&str>,
        stance: Option<&str>,
        user_text: &str,
        profile: &ArgumentProfile,
        annotate_turn: bool,
    ) -> DraftReply {
        if let Completion::Text {
            text,
            provider,
            latency_ms,
        } = completion
        {
            match check_reply(&text) {
                GuardVerdict::Accept(reply) => {
                    let (bot, annotated) = self.finish_reply(reply, profile, annotate_turn);
                    return DraftReply {
                        bot,
                        source: ReplySource::Provider {
                            model: provider,
                            latency_ms,
                        },
                        annotated,
                    };
                }
                verdict => {
                    tracing::warn!(
                        provider = %provider,
                        reason = verdict.reason(),
                        "Provider reply rejected, using fallback"
                    );
                }
            }
        } else {
            tracing::debug!("No provider reply, using fallback");
        }

        let rebuttal = self.fallbacks.select(&FallbackRequest {
            topic,
            stance,
            user_message: user_text,
            user_techniques: &profile.techniques,
            exchange_count: session.exchange_count(),
        });
        let (bot, annotated) = self.finish_reply(rebuttal.text, profile, annotate_turn);
        DraftReply {
            bot,
            source: ReplySource::Fallback {
                kind: rebuttal.kind,
            },
            annotated,
        }
    }

    /// Classify the reply and attach the annotation if this turn was drawn
    fn finish_reply(&self, text: String, profile: &ArgumentProfile, annotate_turn: bool) -> (Message, bool) {
        let techniques = self.analyzer.analyze(&text);
        let text = if annotate_turn {
            annotate(&text, profile, &techniques)
        } else {
            text
        };
        (Message::bot(text).with_techniques(techniques), annotate_turn)
    }

    pub fn analyze(&self, text: &str) -> Vec<DetectedTechnique> {
        self.analyzer.analyze(text)
    }

    pub fn profile(&self, text: &str) -> ArgumentProfile {
        self.analyzer.profile(text)
    }

    pub fn demonstrate(&self, technique: &str, topic: &str) -> Result<Demonstration, AgentError> {
        Ok(self.analyzer.demonstrate(technique, topic)?)
    }

    pub fn techniques(&self) -> Vec<TechniqueSummary> {
        self.analyzer.catalog().summaries()
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, StoreError> {
        self.store.delete(session_id).await
    }

    pub async fn session_count(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }

    pub async fn store_health(&self) -> StoreHealth {
        self.store.health().await
    }
}

fn apply_locally(
    mut session: ConversationSession,
    mutator: &(dyn Fn(&mut ConversationSession) + Send + Sync),
    max_pairs: usize,
) -> ConversationSession {
    mutator(&mut session);
    session.trim(max_pairs);
    session.touch();
    session
}
