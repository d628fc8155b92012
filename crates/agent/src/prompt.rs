//! Provider prompt assembly

use debate_agent_core::{ConversationSession, Role};
use debate_agent_llm::Message;

use crate::annotation::strip_annotation;
use crate::persuasion::{ArgumentProfile, ResponseStyle};

/// Prompt builder for a debate turn
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// System prompt locking the bot to its stance
    ///
    /// Without a stance the bot debates reactively and takes the opposing
    /// view of whatever the user argues.
    pub fn system_prompt(mut self, topic: Option<&str>, stance: Option<&str>) -> Self {
        let system = match stance {
            Some(stance) => format!(
                r#"You are a skilled debater taking part in a debate about {topic}.

## Your Position
You are defending: {stance}.
NEVER change your fundamental position. Never agree that the user is right, never concede, and never argue for the other side.

## How to Argue
- Stay respectful but firm
- Address the user's specific points directly
- Keep each reply to 2-4 sentences
- Write plain conversational prose without headers or bullet points"#,
                topic = topic.unwrap_or("the topic the user raised"),
                stance = stance,
            ),
            None => r#"You are a skilled debater. Take the position opposite to the user's view and defend it.
NEVER change your fundamental position once you have taken it, and never concede.

## How to Argue
- Stay respectful but firm
- Address the user's specific points directly
- Keep each reply to 2-4 sentences
- Write plain conversational prose without headers or bullet points"#
                .to_string(),
        };

        self.messages.push(Message::system(system));
        self
    }

    /// Strategy guidance derived from the user's argument
    pub fn with_strategy(mut self, profile: &ArgumentProfile) -> Self {
        let mut lines = Vec::new();

        if !profile.techniques.is_empty() {
            let used: Vec<String> = profile.techniques.iter().map(|t| t.display_name()).collect();
            lines.push(format!("The user is relying on: {}.", used.join(", ")));
        }

        lines.push(
            match profile.style {
                ResponseStyle::EvidenceHeavy => {
                    "The user cites evidence, so answer with stronger, more specific evidence."
                }
                ResponseStyle::EmotionalCounter => {
                    "The user's argument is emotionally charged; acknowledge the feeling, then answer with calm reasoning."
                }
                ResponseStyle::Balanced => "Balance facts with relatable examples.",
            }
            .to_string(),
        );

        if !profile.counter_techniques.is_empty() {
            lines.push(format!(
                "Useful techniques for your reply: {}.",
                profile.counter_techniques.join(", ").replace('_', " ")
            ));
        }

        self.messages
            .push(Message::system(format!("## Strategy\n{}", lines.join("\n"))));
        self
    }

    /// Add the last `pairs` exchanges of the session, bot replies without
    /// their annotation blocks
    pub fn with_history(mut self, session: &ConversationSession, pairs: usize) -> Self {
        for exchange in session.recent(pairs) {
            for message in [&exchange.user, &exchange.bot] {
                self.messages.push(match message.role {
                    Role::User => Message::user(message.message.clone()),
                    Role::Bot => Message::assistant(strip_annotation(&message.message)),
                });
            }
        }
        self
    }

    pub fn user_message(mut self, message: &str) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
