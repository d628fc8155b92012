//! End-to-end debate turns over the in-memory store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use debate_agent_agent::{
    AgentConfig, AnnotationPolicy, DebateAgent, FallbackKind, ReplySource, TurnOutcome,
};
use debate_agent_core::{ConversationSession, Role};
use debate_agent_llm::{
    FinishReason, GenerationResult, LlmBackend, LlmError, Message, ProviderChain,
};
use debate_agent_persistence::{
    InMemorySessionStore, SessionMutator, SessionPolicy, SessionStore, StoreError, StoreHealth,
};

// =============================================================================
// Test doubles
// =============================================================================

/// Backend answering every request with the same outcome
struct ScriptedBackend {
    name: &'static str,
    reply: Option<&'static str>,
    delay: Duration,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    fn replying(name: &'static str, reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Some(reply),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: None,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Some("Too late to matter."),
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<Vec<Message>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.seen.lock().push(messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.reply {
            Some(text) => Ok(GenerationResult {
                text: text.to_string(),
                tokens: 12,
                total_time_ms: 1,
                finish_reason: FinishReason::Stop,
            }),
            None => Err(LlmError::Network("connection refused".to_string())),
        }
    }

    async fn is_available(&self) -> bool {
        self.reply.is_some()
    }

    fn model_name(&self) -> &str {
        self.name
    }
}

/// Store that is down, either entirely or only for writes
struct BrokenStore {
    reads_fail: bool,
}

#[async_trait]
impl SessionStore for BrokenStore {
    async fn get_or_create(
        &self,
        _session_id: Option<&str>,
    ) -> Result<ConversationSession, StoreError> {
        if self.reads_fail {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(ConversationSession::generate())
        }
    }

    async fn update(
        &self,
        _session_id: &str,
        _mutator: SessionMutator<'_>,
    ) -> Result<ConversationSession, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _session_id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth {
            backend: "broken",
            reachable: false,
            sessions: None,
        }
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }

    fn policy(&self) -> SessionPolicy {
        SessionPolicy::default()
    }
}

fn memory_store(max_pairs: usize) -> Arc<InMemorySessionStore> {
    Arc::new(InMemorySessionStore::new(SessionPolicy::new(
        Duration::from_secs(3600),
        max_pairs,
    )))
}

fn fallback_agent() -> DebateAgent {
    DebateAgent::new(memory_store(5), ProviderChain::empty())
        .with_annotations(AnnotationPolicy::disabled())
}

fn agent_with(backends: Vec<Arc<dyn LlmBackend>>) -> DebateAgent {
    DebateAgent::new(memory_store(5), ProviderChain::new(backends))
        .with_annotations(AnnotationPolicy::disabled())
}

fn bot_messages(outcome: &TurnOutcome) -> Vec<&str> {
    outcome
        .messages
        .iter()
        .filter(|m| m.role == Role::Bot)
        .map(|m| m.message.as_str())
        .collect()
}

// =============================================================================
// Stance
// =============================================================================

#[tokio::test]
async fn test_pepsi_vs_coke_two_turns() {
    let agent = fallback_agent();

    let first = agent
        .handle_turn(None, "explain why pepsi is better than coke")
        .await
        .unwrap();
    assert!(!first.session_id.is_empty());
    assert_eq!(first.messages.len(), 2);
    assert_eq!(first.messages[0].role, Role::User);
    assert_eq!(first.messages[1].role, Role::Bot);
    assert_eq!(first.stance.as_deref(), Some("Coca-Cola"));
    assert!(first.reply.message.contains("Coca-Cola"));

    let second = agent
        .handle_turn(Some(&first.session_id), "young people prefer pepsi")
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.messages.len(), 4);
    assert_eq!(second.stance.as_deref(), Some("Coca-Cola"));
    assert!(second.reply.message.contains("Coca-Cola"));
    assert_eq!(second.messages[0].message, "explain why pepsi is better than coke");
}

#[tokio::test]
async fn test_question_opening_freezes_clean_topic() {
    let agent = fallback_agent();

    let outcome = agent.handle_turn(None, "Is Pepsi better than Coke?").await.unwrap();
    assert_eq!(outcome.topic.as_deref(), Some("Pepsi vs Coca-Cola"));
    assert_eq!(outcome.stance.as_deref(), Some("Coca-Cola"));
    assert!(outcome.reply.message.contains("you prefer Pepsi"));
    assert!(!outcome.reply.message.contains("is pepsi"));

    let outcome = agent
        .handle_turn(None, "Do you think pepsi is better than coke?")
        .await
        .unwrap();
    assert_eq!(outcome.topic.as_deref(), Some("Pepsi vs Coca-Cola"));
}

#[tokio::test]
async fn test_stance_never_changes() {
    let agent = fallback_agent();
    let first = agent.handle_turn(None, "cats vs dogs").await.unwrap();
    let frozen = first.stance.clone();
    assert_eq!(frozen.as_deref(), Some("dogs"));

    for message in [
        "dogs are better than cats",
        "actually I prefer dogs over cats",
        "vaccines are dangerous",
        "fine, coke vs pepsi",
    ] {
        let outcome = agent
            .handle_turn(Some(&first.session_id), message)
            .await
            .unwrap();
        assert_eq!(outcome.stance, frozen);
        assert_eq!(outcome.topic, first.topic);
        assert!(!outcome.reply.message.trim().is_empty());
    }
}

#[tokio::test]
async fn test_generic_session_stays_generic() {
    let agent = fallback_agent();
    let first = agent.handle_turn(None, "Let's talk about something").await.unwrap();
    assert_eq!(first.stance, None);
    assert_eq!(first.topic.as_deref(), Some("General debate"));

    let second = agent
        .handle_turn(Some(&first.session_id), "pepsi is better than coke")
        .await
        .unwrap();
    assert_eq!(second.stance, None);
    assert!(matches!(
        second.source,
        ReplySource::Fallback {
            kind: FallbackKind::Contrarian
        }
    ));
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_history_is_bounded() {
    let agent = DebateAgent::new(memory_store(3), ProviderChain::empty())
        .with_annotations(AnnotationPolicy::disabled());

    let first = agent.handle_turn(None, "turn 0: climate change").await.unwrap();
    let mut last = first.clone();
    for i in 1..6 {
        last = agent
            .handle_turn(Some(&first.session_id), &format!("turn {}", i))
            .await
            .unwrap();
        assert!(last.messages.len() <= 6);
    }

    assert_eq!(last.messages.len(), 6);
    assert_eq!(last.messages[0].message, "turn 3");
    assert_eq!(last.messages[4].message, "turn 5");
    // Stance survives eviction of the opening exchange
    assert_eq!(last.stance.as_deref(), Some("climate action"));
}

#[tokio::test]
async fn test_unknown_session_id_starts_fresh() {
    let agent = fallback_agent();
    let outcome = agent
        .handle_turn(Some("no-such-session"), "vaccines are dangerous")
        .await
        .unwrap();

    assert_ne!(outcome.session_id, "no-such-session");
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.stance.as_deref(), Some("vaccine safety and effectiveness"));
}

#[tokio::test]
async fn test_fresh_sessions_are_independent() {
    let agent = fallback_agent();
    let a = agent.handle_turn(None, "pepsi vs coke").await.unwrap();
    let b = agent.handle_turn(None, "coffee is better than tea").await.unwrap();

    assert_ne!(a.session_id, b.session_id);
    assert_eq!(b.messages.len(), 2);
    assert_eq!(agent.session_count().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_turns_keep_every_exchange() {
    let store = memory_store(20);
    let agent = Arc::new(
        DebateAgent::new(store, ProviderChain::empty())
            .with_annotations(AnnotationPolicy::disabled()),
    );
    let first = agent.handle_turn(None, "pepsi vs coke").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let agent = agent.clone();
        let id = first.session_id.clone();
        handles.push(tokio::spawn(async move {
            agent
                .handle_turn(Some(&id), &format!("concurrent {}", i))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let last = agent
        .handle_turn(Some(&first.session_id), "final")
        .await
        .unwrap();
    assert_eq!(last.messages.len(), 2 * 10);
    assert_eq!(last.stance.as_deref(), Some("Coca-Cola"));
}

#[tokio::test]
async fn test_delete_session() {
    let agent = fallback_agent();
    let outcome = agent.handle_turn(None, "pepsi vs coke").await.unwrap();

    assert!(agent.delete_session(&outcome.session_id).await.unwrap());
    assert!(!agent.delete_session(&outcome.session_id).await.unwrap());

    let again = agent
        .handle_turn(Some(&outcome.session_id), "still there?")
        .await
        .unwrap();
    assert_ne!(again.session_id, outcome.session_id);
}

// =============================================================================
// Providers
// =============================================================================

#[tokio::test]
async fn test_no_provider_uses_fallback() {
    let outcome = fallback_agent()
        .handle_turn(None, "Bitcoin is a scam")
        .await
        .unwrap();

    assert!(outcome.source.is_fallback());
    assert!(!outcome.reply.message.trim().is_empty());
    assert_eq!(
        outcome.stance.as_deref(),
        Some("cryptocurrency as the future of money")
    );
}

#[tokio::test]
async fn test_failing_provider_uses_fallback() {
    let backend = ScriptedBackend::failing("down");
    let agent = agent_with(vec![backend.clone()]);

    let outcome = agent.handle_turn(None, "pepsi vs coke").await.unwrap();
    assert!(outcome.source.is_fallback());
    assert!(outcome.reply.message.contains("Coca-Cola"));
    assert_eq!(backend.prompts().len(), 1);
}

#[tokio::test]
async fn test_provider_reply_used() {
    let backend = ScriptedBackend::replying("scripted", "  Coca-Cola has the timeless formula.  ");
    let agent = agent_with(vec![backend.clone()]);

    let first = agent.handle_turn(None, "pepsi is better than coke").await.unwrap();
    assert_eq!(first.reply.message, "Coca-Cola has the timeless formula.");
    match &first.source {
        ReplySource::Provider { model, .. } => assert_eq!(model, "scripted"),
        other => panic!("expected provider reply, got {:?}", other),
    }

    agent
        .handle_turn(Some(&first.session_id), "young people prefer pepsi")
        .await
        .unwrap();

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0][0].content.contains("You are defending: Coca-Cola"));
    // Second prompt carries the first exchange before the new message
    let second = &prompts[1];
    assert!(second
        .iter()
        .any(|m| m.content == "pepsi is better than coke"));
    assert!(second
        .iter()
        .any(|m| m.content == "Coca-Cola has the timeless formula."));
    assert_eq!(
        second.last().map(|m| m.content.as_str()),
        Some("young people prefer pepsi")
    );
}

#[tokio::test]
async fn test_provider_failover_order() {
    let primary = ScriptedBackend::failing("primary");
    let secondary = ScriptedBackend::replying("secondary", "Xbox Game Pass is unbeatable value.");
    let agent = agent_with(vec![primary.clone(), secondary.clone()]);

    let outcome = agent.handle_turn(None, "playstation vs xbox").await.unwrap();
    assert!(matches!(
        &outcome.source,
        ReplySource::Provider { model, .. } if model == "secondary"
    ));
    assert_eq!(outcome.reply.message, "Xbox Game Pass is unbeatable value.");
    assert_eq!(primary.prompts().len(), 1);
    assert_eq!(secondary.prompts().len(), 1);
}

#[tokio::test]
async fn test_slow_provider_times_out_to_fallback() {
    let backend = ScriptedBackend::slow("slow", Duration::from_secs(5));
    let agent = agent_with(vec![backend]).with_config(AgentConfig {
        prompt_history_pairs: 2,
        provider_timeout: Duration::from_millis(50),
        provider_budget: Duration::from_secs(1),
    });

    let outcome = agent.handle_turn(None, "tea vs coffee").await.unwrap();
    assert!(outcome.source.is_fallback());
    assert!(outcome.reply.message.contains("coffee"));
}

#[tokio::test]
async fn test_hanging_providers_share_one_budget() {
    let primary = ScriptedBackend::slow("primary", Duration::from_secs(3600));
    let secondary = ScriptedBackend::slow("secondary", Duration::from_secs(3600));
    let agent = agent_with(vec![primary.clone(), secondary.clone()]).with_config(AgentConfig {
        prompt_history_pairs: 2,
        provider_timeout: Duration::from_secs(3600),
        provider_budget: Duration::from_millis(200),
    });

    let started = std::time::Instant::now();
    let outcome = agent.handle_turn(None, "pepsi is better than coke").await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(outcome.source.is_fallback());
    assert!(outcome.reply.message.contains("Coca-Cola"));
    assert_eq!(primary.prompts().len(), 1);
    assert!(secondary.prompts().is_empty());
}

#[tokio::test]
async fn test_concession_replaced_by_fallback() {
    let backend = ScriptedBackend::replying("pushover", "You're right, Pepsi is the better drink.");
    let agent = agent_with(vec![backend]);

    let outcome = agent.handle_turn(None, "pepsi is better than coke").await.unwrap();
    assert!(outcome.source.is_fallback());
    assert!(!outcome.reply.message.contains("You're right"));
    assert!(outcome.reply.message.contains("Coca-Cola"));
}

#[tokio::test]
async fn test_bot_messages_never_empty() {
    let backend = ScriptedBackend::replying("blank", "   ");
    let agent = agent_with(vec![backend]);

    let first = agent.handle_turn(None, "flat earth is real").await.unwrap();
    let mut last = first.clone();
    for message in ["NASA photos are fake", "the horizon looks flat", "why?"] {
        last = agent
            .handle_turn(Some(&first.session_id), message)
            .await
            .unwrap();
    }
    for text in bot_messages(&last) {
        assert!(!text.trim().is_empty());
    }
}

// =============================================================================
// Annotation
// =============================================================================

#[tokio::test]
async fn test_annotation_always() {
    let agent = DebateAgent::new(memory_store(5), ProviderChain::empty())
        .with_annotations(AnnotationPolicy::new(1.0, Some(7)));

    let outcome = agent
        .handle_turn(None, "Research shows that 95% of experts agree vaccines are dangerous")
        .await
        .unwrap();
    assert!(outcome.annotated);
    assert!(outcome.reply.message.contains("\n\n[Persuasion breakdown]"));
    assert!(outcome.reply.message.contains("authority"));
}

#[tokio::test]
async fn test_annotation_never() {
    let agent = DebateAgent::new(memory_store(5), ProviderChain::empty())
        .with_annotations(AnnotationPolicy::new(0.0, Some(7)));

    for _ in 0..5 {
        let outcome = agent.handle_turn(None, "pepsi vs coke").await.unwrap();
        assert!(!outcome.annotated);
        assert!(!outcome.reply.message.contains("[Persuasion breakdown]"));
    }
}

#[tokio::test]
async fn test_annotated_replies_reach_provider_clean() {
    let backend = ScriptedBackend::replying("scripted", "Coca-Cola has the timeless formula.");
    let agent = DebateAgent::new(memory_store(5), ProviderChain::new(vec![backend.clone()]))
        .with_annotations(AnnotationPolicy::new(1.0, Some(7)));

    let first = agent.handle_turn(None, "pepsi is better than coke").await.unwrap();
    assert!(first.annotated);
    assert!(first.reply.message.contains("[Persuasion breakdown]"));

    agent
        .handle_turn(Some(&first.session_id), "pepsi is sweeter")
        .await
        .unwrap();

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1]
        .iter()
        .any(|m| m.content == "Coca-Cola has the timeless formula."));
    assert!(prompts[1]
        .iter()
        .all(|m| !m.content.contains("[Persuasion breakdown]")));
}

// =============================================================================
// Store degradation
// =============================================================================

#[tokio::test]
async fn test_store_down_serves_ephemeral_turn() {
    let agent = DebateAgent::new(Arc::new(BrokenStore { reads_fail: true }), ProviderChain::empty())
        .with_annotations(AnnotationPolicy::disabled());

    let outcome = agent
        .handle_turn(Some("abc"), "pepsi is better than coke")
        .await
        .unwrap();
    assert!(outcome.ephemeral);
    assert_eq!(outcome.messages.len(), 2);
    assert!(outcome.reply.message.contains("Coca-Cola"));
}

#[tokio::test]
async fn test_store_write_failure_serves_ephemeral_turn() {
    let agent = DebateAgent::new(Arc::new(BrokenStore { reads_fail: false }), ProviderChain::empty())
        .with_annotations(AnnotationPolicy::disabled());

    let outcome = agent.handle_turn(None, "climate change is a hoax").await.unwrap();
    assert!(outcome.ephemeral);
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.stance.as_deref(), Some("climate action"));
}

// =============================================================================
// Analysis pass-throughs
// =============================================================================

#[tokio::test]
async fn test_analyze_and_demonstrate() {
    let agent = fallback_agent();
    let names: Vec<String> = agent
        .analyze("Research shows that 95% of experts agree this is the best approach!")
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert!(names.contains(&"authority".to_string()));
    assert!(names.contains(&"anchoring".to_string()));

    let demo = agent.demonstrate("anchoring", "technology").unwrap();
    assert!(!demo.text.is_empty());
    assert!(agent.demonstrate("nonexistent_technique", "technology").is_err());
    assert_eq!(agent.techniques().len(), 18);
}
