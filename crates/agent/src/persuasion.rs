//! Persuasion Analyzer
//!
//! Lexical classification of messages against the technique catalog, an
//! argument profile used to steer replies, and templated demonstrations.
//!
//! Every definition is evaluated independently, so one message can exhibit
//! several techniques at once. Confidence is the number of cue occurrences,
//! capped at [`MAX_COUNTED_CUES`], scaled into (0, 1].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use debate_agent_core::{DetectedTechnique, TechniqueCategory};

use crate::catalog::{TechniqueCatalog, TechniqueDefinition};

/// Cue occurrences beyond this add no confidence
pub const MAX_COUNTED_CUES: usize = 4;

/// Analyzer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersuasionError {
    #[error("Unknown technique: {0}")]
    UnknownTechnique(String),
}

// =============================================================================
// Lexicons
// =============================================================================

/// Emotion name and its lexicon
static EMOTIONS: Lazy<Vec<(&'static str, Option<Regex>)>> = Lazy::new(|| {
    vec![
        ("fear", words(&["afraid", "scared", "terrifying", "dangerous", "threat"])),
        ("anger", words(&["outrageous", "disgusting", "ridiculous", "absurd"])),
        ("hope", words(&["amazing", "wonderful", "brilliant", "fantastic"])),
        ("urgency", words(&["now", "immediately", "urgent", "critical", "emergency"])),
    ]
});

static EVIDENCE_CITATION: Lazy<Option<Regex>> =
    Lazy::new(|| words(&["data", "research", "study", "studies", "proof", "evidence"]));
static ACADEMIC_VALIDATION: Lazy<Option<Regex>> =
    Lazy::new(|| words(&["peer-reviewed", "published", "journal"]));
static AUTHORITY_REFERENCE: Lazy<Option<Regex>> =
    Lazy::new(|| words(&["expert", "experts", "professor", "dr"]));
static STATISTIC: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d").ok());

/// Premise, conclusion, conditional and prediction markers
static STRUCTURE_MARKERS: Lazy<Vec<Option<Regex>>> = Lazy::new(|| {
    vec![
        words(&["because", "since", "given that"]),
        words(&["therefore", "thus", "so"]),
        words(&["if", "when", "unless"]),
        words(&["will", "going to", "expect"]),
    ]
});

fn words(list: &[&str]) -> Option<Regex> {
    let alternatives: Vec<String> = list.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}

fn count(regex: &Option<Regex>, text: &str) -> usize {
    regex.as_ref().map(|r| r.find_iter(text).count()).unwrap_or(0)
}

fn present(regex: &Option<Regex>, text: &str) -> bool {
    regex.as_ref().map(|r| r.is_match(text)).unwrap_or(false)
}

// =============================================================================
// Profile
// =============================================================================

/// How the reply should answer the user's style of argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    EvidenceHeavy,
    EmotionalCounter,
    Balanced,
}

impl ResponseStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EvidenceHeavy => "evidence_heavy",
            Self::EmotionalCounter => "emotional_counter",
            Self::Balanced => "balanced",
        }
    }
}

/// Shape of a user's argument, used to steer the reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentProfile {
    pub techniques: Vec<DetectedTechnique>,
    /// Strongest emotion score, 0..=1
    pub emotional_weight: f32,
    /// Share of credibility signals present, 0..=1
    pub evidence_level: f32,
    /// Weighted blend of techniques, evidence, emotion and structure, 0..=1
    pub persuasion_score: f32,
    pub style: ResponseStyle,
    /// Techniques the reply should lean on, at most three
    pub counter_techniques: Vec<&'static str>,
}

impl ArgumentProfile {
    pub fn uses(&self, name: &str) -> bool {
        self.techniques.iter().any(|t| t.name == name)
    }

    pub fn technique_names(&self) -> Vec<&str> {
        self.techniques.iter().map(|t| t.name.as_str()).collect()
    }
}

/// A rendered example of one technique
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demonstration {
    pub technique: &'static str,
    pub category: TechniqueCategory,
    pub text: String,
    pub explanation: &'static str,
}

// =============================================================================
// Analyzer
// =============================================================================

/// Stateless analyzer over a technique catalog
#[derive(Debug, Clone, Copy)]
pub struct PersuasionAnalyzer {
    catalog: &'static TechniqueCatalog,
}

impl Default for PersuasionAnalyzer {
    fn default() -> Self {
        Self::new(TechniqueCatalog::global())
    }
}

impl PersuasionAnalyzer {
    pub fn new(catalog: &'static TechniqueCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'static TechniqueCatalog {
        self.catalog
    }

    /// Detect techniques in catalog order
    pub fn analyze(&self, text: &str) -> Vec<DetectedTechnique> {
        self.catalog
            .iter()
            .filter_map(|technique| {
                let hits = technique.count_cues(text);
                (hits > 0).then(|| {
                    DetectedTechnique::new(technique.name, technique.category, confidence(hits))
                })
            })
            .collect()
    }

    /// Full argument profile of a message
    pub fn profile(&self, text: &str) -> ArgumentProfile {
        let techniques = self.analyze(text);

        let emotions: Vec<f32> = EMOTIONS
            .iter()
            .map(|(_, lexicon)| (0.3 * count(lexicon, text) as f32).min(1.0))
            .collect();
        let emotional_weight = emotions.iter().copied().fold(0.0_f32, f32::max);
        let emotional_intensity: f32 = emotions.iter().sum();

        let signals = credibility_signals(text);
        let evidence_level = (signals as f32 * 0.25).min(1.0);

        let mut structure = STRUCTURE_MARKERS
            .iter()
            .filter(|marker| present(marker, text))
            .count();
        if present(&EVIDENCE_CITATION, text) {
            structure += 1;
        }
        let logical_completeness = structure as f32 / (STRUCTURE_MARKERS.len() + 1) as f32;

        let persuasion_score = (techniques.len() as f32 * 0.3
            + signals as f32 * 0.3
            + emotional_intensity * 0.2
            + logical_completeness * 0.2)
            .min(1.0);

        let style = if evidence_level > 0.5 {
            ResponseStyle::EvidenceHeavy
        } else if emotional_weight > 0.7 {
            ResponseStyle::EmotionalCounter
        } else {
            ResponseStyle::Balanced
        };

        let counter_techniques = counter_techniques(&techniques);

        ArgumentProfile {
            techniques,
            emotional_weight,
            evidence_level,
            persuasion_score,
            style,
            counter_techniques,
        }
    }

    /// Render an exemplar of `technique` about `topic`
    ///
    /// Purely templated; the template is chosen by a stable hash of the
    /// topic so the same request always yields the same text.
    pub fn demonstrate(&self, technique: &str, topic: &str) -> Result<Demonstration, PersuasionError> {
        let definition = self
            .definition(technique)
            .ok_or_else(|| PersuasionError::UnknownTechnique(technique.trim().to_string()))?;

        let topic = topic.trim();
        Ok(Demonstration {
            technique: definition.name,
            category: definition.category,
            text: definition.render(topic_index(topic), topic),
            explanation: definition.description,
        })
    }

    /// Look up a definition by lenient name
    fn definition(&self, technique: &str) -> Option<&'static TechniqueDefinition> {
        self.catalog.get(technique)
    }
}

/// Monotonic in cue count, saturating at [`MAX_COUNTED_CUES`]
pub fn confidence(hits: usize) -> f32 {
    hits.min(MAX_COUNTED_CUES) as f32 / MAX_COUNTED_CUES as f32
}

fn credibility_signals(text: &str) -> usize {
    [
        present(&EVIDENCE_CITATION, text),
        present(&AUTHORITY_REFERENCE, text),
        present(&ACADEMIC_VALIDATION, text),
        present(&STATISTIC, text),
    ]
    .iter()
    .filter(|hit| **hit)
    .count()
}

fn counter_techniques(detected: &[DetectedTechnique]) -> Vec<&'static str> {
    let uses = |name: &str| detected.iter().any(|t| t.name == name);

    let mut counters: Vec<&'static str> = Vec::with_capacity(3);
    if detected.is_empty() {
        counters.extend(["anchoring", "contrast", "authority"]);
    } else {
        if uses("emotional_appeal") {
            counters.push("logical_structure");
        }
        if uses("authority") {
            counters.push("social_proof");
        }
        if uses("social_proof") || uses("bandwagon") {
            counters.push("contrast");
        }
        if detected.iter().any(|t| t.category.is_fallacy()) {
            counters.push("logical_structure");
        }
        if counters.is_empty() {
            counters.push("logical_structure");
        }
    }

    let mut unique = Vec::with_capacity(3);
    for name in counters {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique.truncate(3);
    unique
}

fn topic_index(topic: &str) -> usize {
    topic
        .to_lowercase()
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
}
