//! Session persistence
//!
//! Conversation sessions live behind the [`SessionStore`] trait:
//! - [`InMemorySessionStore`] - process-local, `DashMap` backed
//! - [`RedisSessionStore`] - shared across instances, one JSON record per
//!   session under `{prefix}:{id}` with a native key TTL
//!
//! Every store honours the same contract: expired sessions read as missing,
//! reads and writes refresh the TTL, and `update` is an atomic
//! read-modify-write that trims history to the configured bound.

pub mod memory;
pub mod redis_store;

pub use memory::InMemorySessionStore;
pub use redis_store::RedisSessionStore;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use debate_agent_config::ConversationConfig;
use debate_agent_core::ConversationSession;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Concurrent update conflict on session {0}")]
    Conflict(String),
}

impl StoreError {
    /// Whether callers should degrade instead of failing
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Retention and history bounds applied by every store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub ttl: Duration,
    pub max_pairs: usize,
}

impl SessionPolicy {
    pub fn new(ttl: Duration, max_pairs: usize) -> Self {
        Self { ttl, max_pairs }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&ConversationConfig::default())
    }
}

impl From<&ConversationConfig> for SessionPolicy {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_seconds),
            max_pairs: config.max_pairs,
        }
    }
}

/// Store status for health reporting
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreHealth {
    pub backend: &'static str,
    pub reachable: bool,
    /// Live session count, when cheap enough to compute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<usize>,
}

/// Mutation applied inside [`SessionStore::update`]
///
/// May run more than once when a store retries a compare-and-swap, so it
/// must be a pure function of the session it is given.
pub type SessionMutator<'a> = &'a (dyn Fn(&mut ConversationSession) + Send + Sync);

/// Conversation session store
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session, or start a new one with a generated id
    ///
    /// A missing, unknown or expired id is not an error. New sessions are
    /// not persisted until their first `update`.
    async fn get_or_create(
        &self,
        session_id: Option<&str>,
    ) -> Result<ConversationSession, StoreError>;

    /// Atomically apply `mutator`, trim history, refresh the TTL and persist
    ///
    /// A session that disappeared in the meantime is recreated under the
    /// same id. Returns the stored state.
    async fn update(
        &self,
        session_id: &str,
        mutator: SessionMutator<'_>,
    ) -> Result<ConversationSession, StoreError>;

    /// Remove a session; returns whether it existed
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Number of live sessions
    async fn count(&self) -> Result<usize, StoreError>;

    async fn health(&self) -> StoreHealth;

    fn backend_name(&self) -> &'static str;

    fn policy(&self) -> SessionPolicy;
}
