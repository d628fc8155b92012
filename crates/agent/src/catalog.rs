//! Technique Catalog
//!
//! Process-wide registry of the persuasion techniques and fallacies the
//! analyzer knows about. Each definition pairs a lexical matcher with
//! exemplar templates used by demonstrations. The catalog is built once on
//! first use and never mutated afterwards, so it is shared without locking.
//!
//! Cues are plain words or phrases matched case-insensitively on word
//! boundaries. Definitions may add raw patterns for structural cues such as
//! percentages or "1 in a million".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use debate_agent_core::TechniqueCategory;

/// Placeholder replaced by the topic when rendering a template
pub const TOPIC_PLACEHOLDER: &str = "{topic}";

static CATALOG: Lazy<TechniqueCatalog> = Lazy::new(TechniqueCatalog::builtin);

// =============================================================================
// Definitions
// =============================================================================

/// One catalog entry
#[derive(Debug)]
pub struct TechniqueDefinition {
    pub name: &'static str,
    pub category: TechniqueCategory,
    /// One sentence explaining how the technique works
    pub description: &'static str,
    /// Exemplar templates containing `{topic}`
    pub templates: &'static [&'static str],
    matcher: Option<Regex>,
}

impl TechniqueDefinition {
    /// Number of cue occurrences in `text`
    pub fn count_cues(&self, text: &str) -> usize {
        self.matcher
            .as_ref()
            .map(|m| m.find_iter(text).count())
            .unwrap_or(0)
    }

    pub fn is_fallacy(&self) -> bool {
        self.category.is_fallacy()
    }

    /// Render the template at `index` (wrapping) for `topic`
    pub fn render(&self, index: usize, topic: &str) -> String {
        match self.templates.len() {
            0 => format!("Here is how {} sounds when applied to {}.", self.name, topic),
            len => self.templates[index % len].replace(TOPIC_PLACEHOLDER, topic),
        }
    }

    pub fn summary(&self) -> TechniqueSummary {
        TechniqueSummary {
            name: self.name,
            category: self.category,
            description: self.description,
        }
    }
}

/// Public view of a definition for catalog listings
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TechniqueSummary {
    pub name: &'static str,
    pub category: TechniqueCategory,
    pub description: &'static str,
}

/// Static source data for one definition
struct Entry {
    name: &'static str,
    category: TechniqueCategory,
    description: &'static str,
    cues: &'static [&'static str],
    patterns: &'static [&'static str],
    templates: &'static [&'static str],
}

const ENTRIES: &[Entry] = &[
    Entry {
        name: "authority",
        category: TechniqueCategory::Credibility,
        description: "Appeals to expertise, credentials, or institutional backing to build credibility.",
        cues: &[
            "expert", "experts", "research", "researchers", "study", "studies", "professor",
            "scientist", "scientists", "according to", "peer-reviewed", "published", "journal",
        ],
        patterns: &[r"\bdr\.\s*\w+"],
        templates: &[
            "Leading researchers at top universities who study {topic} have confirmed this again and again.",
            "Industry experts with decades of experience in {topic} agree on this point.",
            "Peer-reviewed studies on {topic} consistently demonstrate the same result.",
        ],
    },
    Entry {
        name: "anchoring",
        category: TechniqueCategory::Numeric,
        description: "Uses specific numbers or statistics to set a reference point that influences perception of subsequent information.",
        cues: &[],
        patterns: &[
            r"\d+(?:[.,]\d+)?\s*(?:%|\bpercent\b|\bper\s+cent\b)",
            r"\b\d+(?:[.,]\d+)?\s*(?:thousand|million|billion|trillion)\b",
            r"\b(?:\d+|one|two|three|four|five|six|seven|eight|nine|ten)\s+(?:out\s+of|in)\s+(?:\d+|ten|a\s+hundred|a\s+thousand|a\s+million)\b",
        ],
        templates: &[
            "Consider this: 73% of experts who follow {topic} agree with this position.",
            "Recent studies on {topic} involving over 10,000 participants point the same way.",
            "In the past decade, we've seen a 400% increase in attention to {topic}, and for good reason.",
        ],
    },
    Entry {
        name: "social_proof",
        category: TechniqueCategory::Consensus,
        description: "Leverages the tendency to follow what others are doing or believing.",
        cues: &[
            "everyone", "everybody", "most people", "majority", "popular", "millions of people",
            "widely accepted", "consensus",
        ],
        patterns: &[],
        templates: &[
            "Millions of people worldwide have already made up their minds about {topic}.",
            "Leading companies and institutions are embracing this view of {topic}.",
            "The growing consensus among professionals on {topic} is clear.",
        ],
    },
    Entry {
        name: "scarcity",
        category: TechniqueCategory::Urgency,
        description: "Creates urgency by emphasizing limited time or opportunity.",
        cues: &[
            "limited", "now", "before it's too late", "urgent", "running out", "last chance",
            "act now", "immediately", "only a few", "window is closing",
        ],
        patterns: &[],
        templates: &[
            "The window of opportunity on {topic} is rapidly closing.",
            "We have limited time to get {topic} right.",
            "The chance to act on {topic} is disappearing while we wait.",
        ],
    },
    Entry {
        name: "emotional_appeal",
        category: TechniqueCategory::Emotional,
        description: "Connects to feelings, values, and emotions rather than purely logical reasoning.",
        cues: &[
            "feel", "heart", "devastating", "amazing", "terrible", "heartbreaking", "tragic",
            "afraid", "scared", "terrifying", "outrageous", "disgusting", "think of the children",
        ],
        patterns: &[],
        templates: &[
            "Imagine the impact {topic} could have on future generations.",
            "The consequences of getting {topic} wrong could be devastating.",
            "Think about what {topic} means for the people you care about.",
        ],
    },
    Entry {
        name: "storytelling",
        category: TechniqueCategory::Narrative,
        description: "Uses narrative to make abstract concepts more relatable and memorable.",
        cues: &[
            "i remember", "imagine", "story", "for example", "once upon", "let me tell you",
            "when i was",
        ],
        patterns: &[],
        templates: &[
            "Let me share an example about {topic} that illustrates this perfectly.",
            "Here's a real-world case from the world of {topic} that shows the impact.",
            "I remember a situation involving {topic} that changed how people saw it.",
        ],
    },
    Entry {
        name: "contrast",
        category: TechniqueCategory::Framing,
        description: "Highlights differences to make one option appear more attractive.",
        cues: &[
            "unlike", "compared to", "compared with", "whereas", "on the other hand",
            "in contrast",
        ],
        patterns: &[],
        templates: &[
            "Unlike the outdated thinking about {topic}, this approach actually delivers.",
            "While traditional views on {topic} suggest otherwise, the results speak for themselves.",
            "Compared to the conventional wisdom on {topic}, the difference is striking.",
        ],
    },
    Entry {
        name: "logical_structure",
        category: TechniqueCategory::Reasoning,
        description: "Presents clear reasoning chains from premises to conclusions.",
        cues: &[
            "because", "therefore", "thus", "hence", "given that", "it follows",
            "consequently", "as a result",
        ],
        patterns: &[],
        templates: &[
            "Given what we know about {topic}, the logical conclusion is clear.",
            "If we follow the reasoning on {topic} to its natural end, only one answer remains.",
            "The evidence on {topic} leads us, step by step, to this conclusion.",
        ],
    },
    Entry {
        name: "reframing",
        category: TechniqueCategory::Framing,
        description: "Recasts the question so the same facts point toward a different conclusion.",
        cues: &[
            "the real question", "the real issue", "another way", "think of it as",
            "it's not about", "what really matters", "look at it this way",
        ],
        patterns: &[],
        templates: &[
            "The real question about {topic} isn't what it costs, it's what it's worth.",
            "Think of {topic} not as a problem but as an opportunity.",
            "It's not about whether {topic} is perfect, it's about whether it's better.",
        ],
    },
    Entry {
        name: "bandwagon",
        category: TechniqueCategory::Consensus,
        description: "Suggests an idea is right because it is becoming more popular.",
        cues: &[
            "everyone is", "everybody is", "left behind", "jump on", "all my friends",
            "trending", "growing number", "catching on",
        ],
        patterns: &[],
        templates: &[
            "A growing number of people are switching sides on {topic}. Don't get left behind.",
            "Everyone is talking about {topic}, and they're all coming to the same conclusion.",
        ],
    },
    Entry {
        name: "reciprocity",
        category: TechniqueCategory::Emotional,
        description: "Creates a sense of obligation by offering something first.",
        cues: &[
            "in return", "return the favor", "you owe", "the least you can do", "i did you",
            "fair's fair",
        ],
        patterns: &[],
        templates: &[
            "I've heard you out on {topic}, so the least you can do is hear me out in return.",
            "I conceded a small point on {topic}, so return the favor and consider mine.",
        ],
    },
    Entry {
        name: "commitment",
        category: TechniqueCategory::Reasoning,
        description: "Holds someone to what they said earlier so that consistency pulls them along.",
        cues: &[
            "you said", "you agreed", "you already", "be consistent", "you admitted",
            "earlier you", "stay true",
        ],
        patterns: &[],
        templates: &[
            "You already agreed that evidence matters for {topic}, so stay consistent.",
            "Earlier you said {topic} should be judged on results. Let's hold to that.",
        ],
    },
    Entry {
        name: "false_dichotomy",
        category: TechniqueCategory::Fallacy,
        description: "Presents only two options when more exist.",
        cues: &[
            "only two", "must choose", "no other option", "no middle ground", "one or the other",
        ],
        patterns: &[r"\beither\b"],
        templates: &[
            "Either you support {topic} completely, or you're part of the problem.",
            "When it comes to {topic}, there are only two options and one of them is wrong.",
        ],
    },
    Entry {
        name: "ad_hominem",
        category: TechniqueCategory::Fallacy,
        description: "Attacks the person making the argument instead of the argument.",
        cues: &["people like you", "typical", "you obviously", "you don't know what you're talking about"],
        patterns: &[
            r"\byou(?:'re|\s+are)\s+(?:just\s+)?(?:an?\s+|so\s+)?(?:idiot|ignorant|stupid|clueless|naive)\b",
        ],
        templates: &[
            "Only people who know nothing about {topic} would think that.",
            "Typical of someone who has never actually looked into {topic}.",
        ],
    },
    Entry {
        name: "appeal_to_nature",
        category: TechniqueCategory::Fallacy,
        description: "Treats what is natural as good and what is artificial as bad.",
        cues: &["natural", "unnatural", "artificial", "nature intended", "chemicals"],
        patterns: &[],
        templates: &[
            "The natural approach to {topic} is always the healthier one.",
            "Anything artificial about {topic} should make you suspicious.",
        ],
    },
    Entry {
        name: "slippery_slope",
        category: TechniqueCategory::Fallacy,
        description: "Claims one step will inevitably lead to an extreme outcome.",
        cues: &[
            "leads to", "lead to", "next thing", "before you know", "slippery slope",
            "where does it end", "opens the door",
        ],
        patterns: &[],
        templates: &[
            "Accept this about {topic} and the next thing you know, everything falls apart.",
            "Today it's {topic}; before you know it, there will be no limits at all.",
        ],
    },
    Entry {
        name: "strawman",
        category: TechniqueCategory::Fallacy,
        description: "Misrepresents an opposing argument to make it easier to attack.",
        cues: &[
            "so you're saying", "so what you're saying", "you just want", "you're basically saying",
            "in other words you",
        ],
        patterns: &[],
        templates: &[
            "So you're saying {topic} doesn't matter at all? That's absurd.",
            "In other words you want to throw out everything we know about {topic}.",
        ],
    },
    Entry {
        name: "hasty_generalization",
        category: TechniqueCategory::Fallacy,
        description: "Draws a broad conclusion from too few examples.",
        cues: &[
            "always", "never", "every single", "all of them", "everyone knows", "nobody",
            "i know someone",
        ],
        patterns: &[],
        templates: &[
            "I tried {topic} once and it failed, so it never works.",
            "Every single person I know agrees about {topic}, so it must be true.",
        ],
    },
];

// =============================================================================
// Catalog
// =============================================================================

/// Immutable technique registry
#[derive(Debug)]
pub struct TechniqueCatalog {
    techniques: Vec<TechniqueDefinition>,
}

impl TechniqueCatalog {
    /// The process-wide catalog
    pub fn global() -> &'static TechniqueCatalog {
        &CATALOG
    }

    /// Build the built-in catalog
    pub fn builtin() -> Self {
        let techniques = ENTRIES
            .iter()
            .map(|entry| TechniqueDefinition {
                name: entry.name,
                category: entry.category,
                description: entry.description,
                templates: entry.templates,
                matcher: compile_matcher(entry.name, entry.cues, entry.patterns),
            })
            .collect();
        Self { techniques }
    }

    /// Look up a technique; case-insensitive, `-` and spaces read as `_`
    pub fn get(&self, name: &str) -> Option<&TechniqueDefinition> {
        let wanted = normalize_name(name);
        self.techniques.iter().find(|t| t.name == wanted)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TechniqueDefinition> {
        self.techniques.iter()
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    pub fn summaries(&self) -> Vec<TechniqueSummary> {
        self.techniques.iter().map(TechniqueDefinition::summary).collect()
    }
}

/// Canonical technique name
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// One case-insensitive alternation over word-bounded cues and raw patterns
fn compile_matcher(name: &str, cues: &[&str], patterns: &[&str]) -> Option<Regex> {
    let alternatives: Vec<String> = cues
        .iter()
        .map(|cue| format!(r"\b{}\b", cue_pattern(cue)))
        .chain(patterns.iter().map(|p| format!("(?:{})", p)))
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    let source = format!("(?i){}", alternatives.join("|"));
    match Regex::new(&source) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!(technique = %name, error = %e, "Invalid technique cue pattern");
            None
        }
    }
}

/// Escape a literal cue and let any run of whitespace match
fn cue_pattern(cue: &str) -> String {
    cue.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}
