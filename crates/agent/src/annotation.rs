//! Educational annotation
//!
//! A reply is occasionally followed by a short breakdown of the techniques
//! each side used. Whether a turn is annotated is drawn from a seedable
//! random source so tests can force either branch.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use debate_agent_config::PersuasionConfig;
use debate_agent_core::DetectedTechnique;

use crate::persuasion::ArgumentProfile;

/// Decides which replies get an annotation
#[derive(Debug)]
pub struct AnnotationPolicy {
    enabled: bool,
    frequency: f64,
    rng: Mutex<StdRng>,
}

impl AnnotationPolicy {
    pub fn new(frequency: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            enabled: true,
            frequency: frequency.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    /// Never annotate
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(0.0, Some(0))
        }
    }

    pub fn from_config(config: &PersuasionConfig) -> Self {
        if !config.educational_mode {
            return Self::disabled();
        }
        Self::new(config.annotation_frequency, config.annotation_seed)
    }

    pub fn frequency(&self) -> f64 {
        if self.enabled {
            self.frequency
        } else {
            0.0
        }
    }

    /// Draw once; always false at 0.0 and always true at 1.0
    pub fn should_annotate(&self) -> bool {
        if !self.enabled || self.frequency <= 0.0 {
            return false;
        }
        if self.frequency >= 1.0 {
            return true;
        }
        self.rng.lock().gen::<f64>() < self.frequency
    }
}

impl Default for AnnotationPolicy {
    fn default() -> Self {
        Self::from_config(&PersuasionConfig::default())
    }
}

/// Heading that opens every annotation block
pub const ANNOTATION_MARKER: &str = "[Persuasion breakdown]";

/// Reply followed by a blank line and the technique breakdown
pub fn annotate(reply: &str, user: &ArgumentProfile, reply_techniques: &[DetectedTechnique]) -> String {
    let mut lines = vec![ANNOTATION_MARKER.to_string()];

    lines.push(format!("Your techniques: {}", names(&user.techniques)));
    lines.push(format!("My techniques: {}", names(reply_techniques)));
    lines.push(dynamics(user).to_string());
    lines.push(meta_commentary(user.techniques.len(), reply_techniques.len()));

    format!("{}\n\n{}", reply.trim_end(), lines.join("\n"))
}

/// The reply without any trailing annotation block
pub fn strip_annotation(text: &str) -> &str {
    match text.rfind(&format!("\n\n{}", ANNOTATION_MARKER)) {
        Some(at) => text[..at].trim_end(),
        None => text,
    }
}

fn names(techniques: &[DetectedTechnique]) -> String {
    if techniques.is_empty() {
        return "none detected".to_string();
    }
    techniques
        .iter()
        .map(|t| t.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn dynamics(user: &ArgumentProfile) -> &'static str {
    if user.persuasion_score > 0.7 {
        "Both sides are layering several techniques, which makes for a sophisticated rhetorical exchange."
    } else if user.techniques.is_empty() {
        "Your message was straightforward, so my reply introduces a few techniques of its own."
    } else {
        "My reply answers your techniques with complementary ones, which makes the contrast easy to study."
    }
}

fn meta_commentary(user_count: usize, reply_count: usize) -> String {
    let mut parts = Vec::new();
    if user_count > 0 {
        parts.push(format!(
            "Your message used {} persuasion technique{}.",
            user_count,
            plural(user_count)
        ));
    }
    parts.push(format!(
        "In response, I used {} technique{}.",
        reply_count,
        plural(reply_count)
    ));
    parts.push("Notice how different techniques can be layered for greater impact.".to_string());
    parts.join(" ")
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
