//! Core types for the debate agent
//!
//! This crate provides the data model shared by every other crate:
//! - Conversation sessions with a bounded exchange history
//! - Messages and speaker roles
//! - Persuasion technique categories and detection results

pub mod conversation;
pub mod technique;

pub use conversation::{ConversationSession, Exchange, Message, Role, GENERIC_TOPIC};
pub use technique::{DetectedTechnique, TechniqueCategory};
