//! Reply guard
//!
//! Provider output is untrusted. A reply that is blank or concedes the
//! debate is rejected and the caller substitutes a fallback rebuttal.

/// Phrases that give the user's side the win
const CONCESSION_PHRASES: &[&str] = &[
    "you're right",
    "you are right",
    "you're absolutely right",
    "you are absolutely right",
    "i agree with you",
    "i completely agree",
    "you've convinced me",
    "you have convinced me",
    "i concede",
    "i was wrong",
    "i changed my mind",
    "i've changed my mind",
    "i have changed my mind",
    "i stand corrected",
    "you win this debate",
    "i can't argue with that",
];

/// Outcome of checking a provider reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Usable reply, trimmed
    Accept(String),
    Empty,
    /// Reply contains the given concession phrase
    Concession(&'static str),
}

impl GuardVerdict {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Accept(_) => "accepted",
            Self::Empty => "empty",
            Self::Concession(_) => "concession",
        }
    }
}

/// Check a provider reply before it reaches the user
pub fn check_reply(text: &str) -> GuardVerdict {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return GuardVerdict::Empty;
    }

    let lowered = normalize_quotes(&trimmed.to_lowercase());
    if let Some(phrase) = CONCESSION_PHRASES
        .iter()
        .find(|phrase| contains_phrase(&lowered, phrase))
    {
        return GuardVerdict::Concession(phrase);
    }

    GuardVerdict::Accept(trimmed.to_string())
}

/// Whether `phrase` occurs in `haystack` on word boundaries
///
/// Both sides are expected to be lowercase already.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = !phrase.starts_with(is_word)
            || haystack[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = !phrase.ends_with(is_word)
            || haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        before_ok && after_ok
    })
}

fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}
