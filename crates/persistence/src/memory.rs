//! In-memory session store
//!
//! Sessions are kept in a `DashMap`. An update holds the entry's shard lock
//! for the whole read-modify-write, which linearizes concurrent turns on the
//! same session id. Expiry is checked lazily on access; the optional sweep
//! task only reclaims memory.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use debate_agent_core::ConversationSession;

use crate::{SessionMutator, SessionPolicy, SessionStore, StoreError, StoreHealth};

struct Entry {
    session: ConversationSession,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local session store
pub struct InMemorySessionStore {
    sessions: DashMap<String, Entry>,
    policy: SessionPolicy,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(SessionPolicy::default())
    }
}

impl InMemorySessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
        }
    }

    /// Remove every expired session, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    /// Periodically sweep expired sessions until the returned sender sends `true`
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = store.cleanup_expired();
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = store.sessions.len(),
                                "Session sweep removed expired sessions"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session sweep task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(
        &self,
        session_id: Option<&str>,
    ) -> Result<ConversationSession, StoreError> {
        let now = Instant::now();

        if let Some(id) = session_id {
            self.sessions.remove_if(id, |_, entry| entry.is_expired(now));

            if let Some(mut entry) = self.sessions.get_mut(id) {
                entry.expires_at = now + self.policy.ttl;
                entry.session.touch();
                return Ok(entry.session.clone());
            }

            tracing::debug!(session_id = %id, "Unknown or expired session, starting a new one");
        }

        Ok(ConversationSession::generate())
    }

    async fn update(
        &self,
        session_id: &str,
        mutator: SessionMutator<'_>,
    ) -> Result<ConversationSession, StoreError> {
        let now = Instant::now();
        let expires_at = now + self.policy.ttl;

        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Entry {
                session: ConversationSession::new(session_id),
                expires_at,
            });

        if entry.is_expired(now) {
            entry.session = ConversationSession::new(session_id);
        }

        mutator(&mut entry.session);
        entry.session.trim(self.policy.max_pairs);
        entry.session.touch();
        entry.session.version += 1;
        entry.expires_at = expires_at;

        Ok(entry.session.clone())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .sessions
            .remove(session_id)
            .map(|(_, entry)| !entry.is_expired(now))
            .unwrap_or(false))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        Ok(self
            .sessions
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count())
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth {
            backend: self.backend_name(),
            reachable: true,
            sessions: self.count().await.ok(),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn policy(&self) -> SessionPolicy {
        self.policy
    }
}
