//! Persuasion technique categories and detection results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse family a persuasion technique belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueCategory {
    /// Appeals to expertise or institutions
    Credibility,
    /// Appeals to what other people think or do
    Consensus,
    /// Reference points set by numbers and statistics
    Numeric,
    /// Appeals to feelings rather than reasons
    Emotional,
    /// Stories, anecdotes and imagined scenarios
    Narrative,
    /// Recasting or contrasting the question
    Framing,
    /// Time pressure and limited opportunity
    Urgency,
    /// Explicit premise/conclusion chains
    Reasoning,
    /// Flawed argument structure
    Fallacy,
}

impl TechniqueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credibility => "credibility",
            Self::Consensus => "consensus",
            Self::Numeric => "numeric",
            Self::Emotional => "emotional",
            Self::Narrative => "narrative",
            Self::Framing => "framing",
            Self::Urgency => "urgency",
            Self::Reasoning => "reasoning",
            Self::Fallacy => "fallacy",
        }
    }

    /// Whether techniques in this category are argument fallacies
    pub fn is_fallacy(&self) -> bool {
        matches!(self, Self::Fallacy)
    }
}

impl fmt::Display for TechniqueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A technique found in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTechnique {
    /// Catalog name, e.g. `authority`
    pub name: String,
    pub category: TechniqueCategory,
    /// Coarse cue-count score in (0, 1]
    pub confidence: f32,
}

impl DetectedTechnique {
    pub fn new(name: impl Into<String>, category: TechniqueCategory, confidence: f32) -> Self {
        Self {
            name: name.into(),
            category,
            confidence,
        }
    }

    /// Human readable name (`social_proof` -> `social proof`)
    pub fn display_name(&self) -> String {
        self.name.replace('_', " ")
    }
}
