//! Conversation types: roles, messages, exchanges and sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::technique::DetectedTechnique;

/// Topic frozen into sessions whose opening message matched no stance rule
pub const GENERIC_TOPIC: &str = "General debate";

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Bot => write!(f, "bot"),
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Techniques detected in `message`, filled in after classification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub techniques: Vec<DetectedTechnique>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Role::Bot, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            message: text.into(),
            timestamp: Utc::now(),
            techniques: Vec::new(),
        }
    }

    pub fn with_techniques(mut self, techniques: Vec<DetectedTechnique>) -> Self {
        self.techniques = techniques;
        self
    }
}

/// One user message and the bot reply to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: Message,
    pub bot: Message,
}

impl Exchange {
    pub fn new(user: Message, bot: Message) -> Self {
        Self { user, bot }
    }
}

/// Conversation state for one debate
///
/// The stance is frozen by the first turn and never changes afterwards.
/// History holds at most the configured number of exchanges; the store
/// trims it on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    /// Side the bot defends; `None` for a generic (reactive) debate
    #[serde(default)]
    pub stance: Option<String>,
    #[serde(default)]
    pub history: VecDeque<Exchange>,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    /// Incremented on every persisted write, used for compare-and-swap
    #[serde(default)]
    pub version: u64,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            topic: None,
            stance: None,
            history: VecDeque::new(),
            created_at: now,
            last_access: now,
            version: 0,
        }
    }

    /// Create a session with a freshly generated id
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Whether the opening message has already been through stance extraction
    ///
    /// A generic debate sets the topic but leaves the stance empty, so the
    /// topic is the marker.
    pub fn is_stance_resolved(&self) -> bool {
        self.topic.is_some()
    }

    /// Freeze topic and stance if not already resolved
    ///
    /// Returns false when a stance was already frozen; the existing values
    /// are left untouched.
    pub fn freeze_stance(&mut self, topic: impl Into<String>, stance: Option<String>) -> bool {
        if self.is_stance_resolved() {
            return false;
        }
        self.topic = Some(topic.into());
        self.stance = stance;
        true
    }

    /// Append an exchange, evicting the oldest ones beyond `max_pairs`
    pub fn push_exchange(&mut self, exchange: Exchange, max_pairs: usize) {
        self.history.push_back(exchange);
        self.trim(max_pairs);
    }

    /// Drop the oldest exchanges until at most `max_pairs` remain
    pub fn trim(&mut self, max_pairs: usize) {
        while self.history.len() > max_pairs {
            self.history.pop_front();
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    pub fn exchange_count(&self) -> usize {
        self.history.len()
    }

    /// Flattened history, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.history
            .iter()
            .flat_map(|e| [e.user.clone(), e.bot.clone()])
            .collect()
    }

    /// The last `pairs` exchanges, oldest first
    pub fn recent(&self, pairs: usize) -> impl Iterator<Item = &Exchange> {
        let skip = self.history.len().saturating_sub(pairs);
        self.history.iter().skip(skip)
    }
}
