//! Debate Agent
//!
//! Features:
//! - Technique catalog and lexical persuasion analysis
//! - One-shot stance extraction from the opening message
//! - Provider prompt assembly with a locked stance
//! - Deterministic fallback rebuttals and a concession guard
//! - Seedable educational annotations
//! - Turn orchestration over a session store and provider chain

pub mod annotation;
pub mod catalog;
pub mod fallback;
pub mod guard;
pub mod orchestrator;
pub mod persuasion;
pub mod prompt;
pub mod stance;

pub use annotation::AnnotationPolicy;
pub use catalog::{TechniqueCatalog, TechniqueDefinition, TechniqueSummary};
pub use fallback::{FallbackKind, FallbackRequest, FallbackTable, Rebuttal};
pub use guard::{check_reply, GuardVerdict};
pub use orchestrator::{AgentConfig, DebateAgent, ReplySource, TurnOutcome};
pub use persuasion::{ArgumentProfile, Demonstration, PersuasionAnalyzer, PersuasionError, ResponseStyle};
pub use prompt::PromptBuilder;
pub use stance::{StanceExtractor, StanceOutcome};

use thiserror::Error;

use debate_agent_persistence::StoreError;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store failure that cannot be served ephemerally
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Persuasion(#[from] PersuasionError),
}
