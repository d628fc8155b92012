//! Redis session store
//!
//! Each session is one JSON record under `{prefix}:{id}` with a native key
//! TTL. Reads refresh the TTL in the same pipeline as the GET. Updates are
//! optimistic: read, mutate locally, then write through a Lua script that
//! only replaces the record if its `version` is still the one that was read.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use debate_agent_core::ConversationSession;

use crate::{SessionMutator, SessionPolicy, SessionStore, StoreError, StoreHealth};

/// Give up on an update after this many lost races
const MAX_CAS_ATTEMPTS: usize = 16;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// KEYS[1] session key
/// ARGV[1] expected version, -1 when the key was absent or unreadable
/// ARGV[2] new record, ARGV[3] ttl in seconds
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
local version = -1
if current then
  local ok, decoded = pcall(cjson.decode, current)
  if ok and type(decoded) == 'table' then
    version = tonumber(decoded['version']) or 0
  end
end
if version ~= tonumber(ARGV[1]) then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', tonumber(ARGV[3]))
return 1
"#;

/// Redis-backed session store shared across server instances
pub struct RedisSessionStore {
    redis: ConnectionManager,
    key_prefix: String,
    policy: SessionPolicy,
    cas: redis::Script,
}

impl RedisSessionStore {
    /// Connect and verify the server answers
    pub async fn connect(
        redis_url: &str,
        key_prefix: &str,
        policy: SessionPolicy,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let redis = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Unavailable(format!("timed out connecting to {}", redis_url)))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self::from_connection(redis, key_prefix, policy))
    }

    /// Build from an existing connection
    pub fn from_connection(redis: ConnectionManager, key_prefix: &str, policy: SessionPolicy) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.to_string(),
            policy,
            cas: redis::Script::new(CAS_SCRIPT),
        }
    }

    fn key(&self, session_id: &str) -> String {
        session_key(&self.key_prefix, session_id)
    }

    fn ttl_seconds(&self) -> u64 {
        ttl_seconds(self.policy.ttl)
    }

    /// GET the record and refresh its TTL in one round trip
    async fn load(&self, key: &str) -> Result<Option<ConversationSession>, StoreError> {
        let mut conn = self.redis.clone();
        let (raw,): (Option<String>,) = redis::pipe()
            .cmd("GET")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(self.ttl_seconds())
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(raw.and_then(|raw| decode_record(key, &raw)))
    }
}

/// Redis key for a session
pub fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{}:{}", prefix, session_id)
}

/// Redis expiry granularity is one second; never send zero
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Unreadable records are treated as missing so a bad write cannot wedge a session
fn decode_record(key: &str, raw: &str) -> Option<ConversationSession> {
    match serde_json::from_str(raw) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding unreadable session record");
            None
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_or_create(
        &self,
        session_id: Option<&str>,
    ) -> Result<ConversationSession, StoreError> {
        if let Some(id) = session_id {
            if let Some(mut session) = self.load(&self.key(id)).await? {
                session.touch();
                return Ok(session);
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
        let key = self.key(session_id);
        let ttl = self.ttl_seconds();
        let mut conn = self.redis.clone();

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.load(&key).await?;
            let expected: i64 = current.as_ref().map(|s| s.version as i64).unwrap_or(-1);

            let mut session = current.unwrap_or_else(|| ConversationSession::new(session_id));
            mutator(&mut session);
            session.trim(self.policy.max_pairs);
            session.touch();
            session.version += 1;

            let payload = serde_json::to_string(&session)?;
            let swapped: i64 = self
                .cas
                .key(&key)
                .arg(expected)
                .arg(payload)
                .arg(ttl)
                .invoke_async(&mut conn)
                .await?;

            if swapped == 1 {
                return Ok(session);
            }

            tracing::debug!(session_id = %session_id, attempt, "Session write lost a race, retrying");
        }

        tracing::warn!(
            session_id = %session_id,
            attempts = MAX_CAS_ATTEMPTS,
            "Giving up on contended session update"
        );
        Err(StoreError::Conflict(session_id.to_string()))
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();
        let removed: usize = conn.del(self.key(session_id)).await?;
        Ok(removed > 0)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let mut conn = self.redis.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}:*", self.key_prefix))
            .query_async(&mut conn)
            .await?;
        Ok(keys.len())
    }

    async fn health(&self) -> StoreHealth {
        let mut conn = self.redis.clone();
        let ping_cmd = redis::cmd("PING");
        let ping = ping_cmd.query_async::<_, String>(&mut conn);
        let reachable = matches!(tokio::time::timeout(PING_TIMEOUT, ping).await, Ok(Ok(_)));

        let sessions = if reachable {
            self.count().await.ok()
        } else {
            None
        };

        StoreHealth {
            backend: self.backend_name(),
            reachable,
            sessions,
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn policy(&self) -> SessionPolicy {
        self.policy
    }
}
