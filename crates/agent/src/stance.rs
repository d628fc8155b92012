//! Stance Extractor
//!
//! Decides, from the opening message only, which side the agent defends.
//! Two ordered tables drive it:
//! - comparative rules ("A is better than B", "A vs B", ...), tried in
//!   priority order, first match wins
//! - topic keyword rules mapping a subject to a canonical opposing stance
//!
//! Extraction is a pure function of the text. When nothing matches the
//! result is [`StanceOutcome::Generic`] and the agent debates reactively.

use regex::Regex;
use serde::Serialize;

use debate_agent_config::TopicSettings;
use debate_agent_core::GENERIC_TOPIC;

/// Lead-ins removed before matching, longest first
const LEADING_FILLERS: &[&str] = &[
    "can you explain why",
    "please explain why",
    "explain why",
    "tell me why",
    "convince me that",
    "convince me",
    "which is better",
    "what's better",
    "why do you think",
    "why",
    "do you think that",
    "do you think",
    "don't you think that",
    "don't you think",
    "dont you think",
    "wouldn't you agree that",
    "would you agree that",
    "isn't it true that",
    "is it true that",
    "isn't",
    "aren't",
    "is",
    "are",
    "i think that",
    "i think",
    "i believe that",
    "i believe",
    "in my opinion",
    "honestly",
];

/// Lowercase key and display name for well-known entities
const ENTITY_ALIASES: &[(&str, &str)] = &[
    ("coke", "Coca-Cola"),
    ("coca-cola", "Coca-Cola"),
    ("coca cola", "Coca-Cola"),
    ("pepsi", "Pepsi"),
    ("iphone", "iPhone"),
    ("iphones", "iPhone"),
    ("ios", "iPhone"),
    ("android", "Android"),
    ("xbox", "Xbox"),
    ("playstation", "PlayStation"),
    ("ps5", "PlayStation"),
    ("mac", "Mac"),
    ("macs", "Mac"),
    ("macbook", "Mac"),
    ("pc", "PC"),
    ("pcs", "PC"),
    ("windows", "PC"),
];

/// Question openers left in front of an entity taken from mid-sentence
const QUESTION_LEADS: &[&str] = &[
    "do you think ",
    "don't you think ",
    "dont you think ",
    "isn't ",
    "aren't ",
    "is ",
    "are ",
];

/// Words that end the trailing entity of a comparison
const CONNECTIVES: &[&str] = &[" because ", " since ", " but ", " and ", " when ", " if ", " as ", " for "];

/// Captures that are not something one can defend
const NON_ENTITIES: &[&str] = &[
    "it", "this", "that", "not", "no", "nothing", "anything", "something", "whatever",
];

/// Which named entity the agent defends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defend {
    First,
    Second,
}

/// Result of stance extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StanceOutcome {
    Fixed { topic: String, stance: String },
    Generic,
}

impl StanceOutcome {
    pub fn topic(&self) -> &str {
        match self {
            Self::Fixed { topic, .. } => topic,
            Self::Generic => GENERIC_TOPIC,
        }
    }

    pub fn stance(&self) -> Option<&str> {
        match self {
            Self::Fixed { stance, .. } => Some(stance),
            Self::Generic => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Generic)
    }

    /// `(topic, stance)` as frozen into a session
    pub fn into_parts(self) -> (String, Option<String>) {
        match self {
            Self::Fixed { topic, stance } => (topic, Some(stance)),
            Self::Generic => (GENERIC_TOPIC.to_string(), None),
        }
    }
}

/// Comparative phrase rule
#[derive(Debug)]
pub struct StanceRule {
    pub name: &'static str,
    pattern: Regex,
    defend: Defend,
}

impl StanceRule {
    fn new(name: &'static str, pattern: &str, defend: Defend) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(pattern) => Some(Self { name, pattern, defend }),
            Err(e) => {
                tracing::error!(rule = name, error = %e, "Invalid stance rule pattern");
                None
            }
        }
    }

    /// Match against normalized text, returning `(first, second)` entities
    fn capture(&self, text: &str) -> Option<(String, String)> {
        let caps = self.pattern.captures(text)?;
        let first = clean_entity(last_clause(caps.name("a")?.as_str()))?;
        let second = clean_entity(first_clause(caps.name("b")?.as_str()))?;
        if first == second {
            return None;
        }
        Some((first, second))
    }
}

/// Subject keyword rule
#[derive(Debug)]
pub struct TopicRule {
    pub id: String,
    pub label: String,
    pub stance: String,
    keywords: Regex,
}

impl TopicRule {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        keywords: &[&str],
        stance: impl Into<String>,
    ) -> Option<Self> {
        let id = id.into();
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(&k.to_lowercase()))
            .collect();
        if alternatives.is_empty() {
            tracing::warn!(topic = %id, "Topic has no keywords, skipping");
            return None;
        }

        let keywords = Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).ok()?;
        Some(Self {
            id,
            label: label.into(),
            stance: stance.into(),
            keywords,
        })
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords.is_match(normalized)
    }
}

/// Ordered rule tables
#[derive(Debug)]
pub struct StanceExtractor {
    comparative: Vec<StanceRule>,
    topics: Vec<TopicRule>,
}

impl StanceExtractor {
    pub fn builtin() -> Self {
        Self {
            comparative: builtin_comparative_rules(),
            topics: builtin_topic_rules(),
        }
    }

    /// Built-in tables followed by configured topics
    pub fn with_topics(extra: &[TopicSettings]) -> Self {
        let mut extractor = Self::builtin();
        for topic in extra {
            let keywords: Vec<&str> = topic.keywords.iter().map(String::as_str).collect();
            if let Some(rule) = TopicRule::new(&topic.id, &topic.id, &keywords, &topic.stance) {
                extractor.topics.push(rule);
            }
        }
        extractor
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Extract the stance to defend from an opening message
    pub fn extract(&self, first_message: &str) -> StanceOutcome {
        let normalized = normalize(first_message);
        if normalized.is_empty() {
            return StanceOutcome::Generic;
        }

        for rule in &self.comparative {
            if let Some((first, second)) = rule.capture(&normalized) {
                let (a, b) = (display_entity(&first), display_entity(&second));
                let stance = match rule.defend {
                    Defend::First => a.clone(),
                    Defend::Second => b.clone(),
                };
                tracing::debug!(rule = rule.name, stance = %stance, "Comparative stance matched");
                return StanceOutcome::Fixed {
                    topic: format!("{} vs {}", a, b),
                    stance,
                };
            }
        }

        if let Some(rule) = self.topics.iter().find(|rule| rule.matches(&normalized)) {
            tracing::debug!(topic = %rule.id, stance = %rule.stance, "Topic keyword matched");
            return StanceOutcome::Fixed {
                topic: rule.label.clone(),
                stance: rule.stance.clone(),
            };
        }

        StanceOutcome::Generic
    }
}

fn builtin_comparative_rules() -> Vec<StanceRule> {
    const INTENSIFIER: &str = r"(?:much\s+|way\s+|far\s+|so\s+much\s+)?";
    [
        StanceRule::new(
            "better_than",
            &format!(
                r"^(?P<a>.+?)\s+(?:(?:is|are)\s+)?{}(?:better|superior|preferable)\s+(?:than|to)\s+(?P<b>.+)$",
                INTENSIFIER
            ),
            Defend::Second,
        ),
        StanceRule::new(
            "beats",
            r"^(?P<a>.+?)\s+(?:beats|outperforms|outclasses|crushes|destroys|wins\s+(?:against|over))\s+(?P<b>.+)$",
            Defend::Second,
        ),
        StanceRule::new(
            "worse_than",
            &format!(
                r"^(?P<a>.+?)\s+(?:(?:is|are)\s+)?{}(?:worse|inferior)\s+(?:than|to)\s+(?P<b>.+)$",
                INTENSIFIER
            ),
            Defend::First,
        ),
        StanceRule::new(
            "prefer_over",
            r"^i\s+(?:much\s+)?prefer\s+(?P<a>.+?)\s+(?:over|to)\s+(?P<b>.+)$",
            Defend::Second,
        ),
        StanceRule::new(
            "versus",
            r"^(?P<a>.+?)\s+(?:vs\.?|versus)\s+(?P<b>.+)$",
            Defend::Second,
        ),
        StanceRule::new(
            "either_or",
            r"^(?P<a>[\w'-]+(?:\s+[\w'-]+){0,2})\s+or\s+(?P<b>[\w'-]+(?:\s+[\w'-]+){0,2})$",
            Defend::Second,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn builtin_topic_rules() -> Vec<TopicRule> {
    [
        TopicRule::new(
            "vaccines",
            "Vaccines",
            &["vaccine", "vaccines", "vaccination", "vaccinated", "immunization", "anti-vax", "antivax"],
            "vaccine safety and effectiveness",
        ),
        TopicRule::new(
            "climate",
            "Climate change",
            &["climate", "global warming", "greenhouse", "carbon emissions"],
            "climate action",
        ),
        TopicRule::new(
            "flat_earth",
            "Flat Earth",
            &["flat earth", "earth is flat", "round earth", "globe earth"],
            "the spherical Earth and scientific evidence",
        ),
        TopicRule::new(
            "crypto",
            "Cryptocurrency",
            &["crypto", "cryptocurrency", "cryptocurrencies", "bitcoin", "ethereum", "blockchain"],
            "cryptocurrency as the future of money",
        ),
        TopicRule::new("pepsi", "Pepsi vs Coca-Cola", &["pepsi"], "Coca-Cola"),
        TopicRule::new("coke", "Coca-Cola vs Pepsi", &["coke", "coca-cola", "coca cola"], "Pepsi"),
        TopicRule::new("android", "Android vs iPhone", &["android"], "iPhone"),
        TopicRule::new("ios", "iPhone vs Android", &["ios", "iphone", "iphones"], "Android"),
        TopicRule::new("pc", "PC vs Mac", &["pc", "pcs", "windows"], "Mac"),
        TopicRule::new("mac", "Mac vs PC", &["mac", "macs", "macbook", "macos"], "PC"),
        TopicRule::new("playstation", "PlayStation vs Xbox", &["playstation", "ps5", "ps4"], "Xbox"),
        TopicRule::new("xbox", "Xbox vs PlayStation", &["xbox"], "PlayStation"),
        TopicRule::new("coffee", "Coffee vs tea", &["coffee", "espresso"], "tea"),
        TopicRule::new("tea", "Tea vs coffee", &["tea"], "coffee"),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Lowercase, collapse whitespace, drop end punctuation and lead-in phrases
pub fn normalize(text: &str) -> String {
    let mut normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    loop {
        let trimmed = normalized
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, '?' | '!' | '.' | ',' | ':' | ';'))
            .to_string();

        let stripped = LEADING_FILLERS.iter().find_map(|filler| {
            trimmed
                .strip_prefix(filler)
                .filter(|rest| rest.is_empty() || rest.starts_with([' ', ',', ':']))
                .map(|rest| rest.to_string())
        });

        match stripped {
            Some(rest) => normalized = rest,
            None => return trimmed,
        }
    }
}

fn is_clause_break(c: char) -> bool {
    matches!(c, ',' | ':' | ';' | '?' | '!' | '.')
}

/// Text after the last clause break
fn last_clause(text: &str) -> &str {
    text.rsplit(is_clause_break).next().unwrap_or(text)
}

/// Text before the first clause break or connective
fn first_clause(text: &str) -> &str {
    let mut end = text.find(is_clause_break).unwrap_or(text.len());
    for connective in CONNECTIVES {
        if let Some(index) = text[..end].find(connective) {
            end = end.min(index);
        }
    }
    &text[..end]
}

fn clean_entity(raw: &str) -> Option<String> {
    let mut entity = raw
        .trim_matches(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '-'))
        .to_string();

    if let Some(rest) = QUESTION_LEADS.iter().find_map(|lead| entity.strip_prefix(lead)) {
        entity = rest.trim().to_string();
    }

    for article in ["the ", "a ", "an "] {
        if let Some(rest) = entity.strip_prefix(article) {
            entity = rest.trim().to_string();
            break;
        }
    }

    if entity.is_empty() || NON_ENTITIES.contains(&entity.as_str()) {
        return None;
    }
    Some(entity)
}

fn display_entity(entity: &str) -> String {
    ENTITY_ALIASES
        .iter()
        .find(|(key, _)| *key == entity)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| entity.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(topic: &str, stance: &str) -> StanceOutcome {
        StanceOutcome::Fixed {
            topic: topic.to_string(),
            stance: stance.to_string(),
        }
    }

    #[test]
    fn test_better_than_defends_second() {
        let extractor = StanceExtractor::builtin();
        assert_eq!(
            extractor.extract("explain why pepsi is better than coke"),
            fixed("Pepsi vs Coca-Cola", "Coca-Cola")
        );
        assert_eq!(
            extractor.extract("Android is better than iOS"),
            fixed("Android vs iPhone", "iPhone")
        );
        assert_eq!(
            extractor.extract("why iphone is superior to android?"),
            fixed("iPhone vs Android", "Android")
        );
    }

    #[test]
    fn test_other_comparatives() {
        let extractor = StanceExtractor::builtin();
        assert_eq!(extractor.extract("playstation vs xbox").stance(), Some("Xbox"));
        assert_eq!(extractor.extract("PlayStation beats Xbox").stance(), Some("Xbox"));
        assert_eq!(extractor.extract("cats are worse than dogs").stance(), Some("cats"));
        assert_eq!(extractor.extract("I prefer the mac over the pc").stance(), Some("PC"));
        assert_eq!(extractor.extract("cats or dogs?").stance(), Some("dogs"));
    }

    #[test]
    fn test_question_openings() {
        let extractor = StanceExtractor::builtin();
        let pepsi = fixed("Pepsi vs Coca-Cola", "Coca-Cola");

        assert_eq!(extractor.extract("Is Pepsi better than Coke?"), pepsi);
        assert_eq!(extractor.extract("Do you think pepsi is better than coke?"), pepsi);
        assert_eq!(extractor.extract("Don't you think that Pepsi is superior to Coke?"), pepsi);
        assert_eq!(extractor.extract("Isn't pepsi way better than coke"), pepsi);
        assert_eq!(extractor.extract("So, is pepsi better than coke?"), pepsi);
        assert_eq!(extractor.extract("Aren't cats better than dogs?"), fixed("cats vs dogs", "dogs"));
        assert_eq!(
            extractor.extract("Don't you think PlayStation beats Xbox?"),
            fixed("PlayStation vs Xbox", "Xbox")
        );
        assert_eq!(extractor.extract("Which is better, tea or coffee?"), fixed("tea vs coffee", "coffee"));
    }

    #[test]
    fn test_rule_priority_breaks_ties() {
        // Both "better than" and "vs" match; the earlier rule wins.
        let outcome = StanceExtractor::builtin().extract("tea vs coffee: tea is better than coffee");
        assert_eq!(outcome, fixed("tea vs coffee", "coffee"));

        // "worse than" outranks "vs", so the first named side is defended
        let outcome = StanceExtractor::builtin().extract("pepsi vs coke, coke is worse than pepsi");
        assert_eq!(outcome, fixed("Coca-Cola vs Pepsi", "Coca-Cola"));
    }

    #[test]
    fn test_topic_keywords() {
        let extractor = StanceExtractor::builtin();
        assert_eq!(
            extractor.extract("Vaccines are dangerous"),
            fixed("Vaccines", "vaccine safety and effectiveness")
        );
        assert_eq!(extractor.extract("climate change is a hoax").stance(), Some("climate action"));
        assert_eq!(extractor.extract("Bitcoin is a scam").topic(), "Cryptocurrency");
        assert_eq!(extractor.extract("I love my android phone").stance(), Some("iPhone"));
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        let extractor = StanceExtractor::builtin();
        // "steam" contains "tea", "machine" contains "mac"
        assert!(extractor.extract("steam machines are great").is_generic());
    }

    #[test]
    fn test_generic() {
        let extractor = StanceExtractor::builtin();
        let outcome = extractor.extract("hello there");
        assert!(outcome.is_generic());
        assert_eq!(outcome.into_parts(), (GENERIC_TOPIC.to_string(), None));
        assert!(extractor.extract("   ").is_generic());
    }

    #[test]
    fn test_deterministic() {
        let extractor = StanceExtractor::builtin();
        for message in ["pepsi is better than coke", "vaccines are bad", "nothing here"] {
            assert_eq!(extractor.extract(message), extractor.extract(message));
        }
    }

    #[test]
    fn test_configured_topics_are_appended() {
        let extractor = StanceExtractor::with_topics(&[TopicSettings {
            id: "remote_work".to_string(),
            keywords: vec!["remote work".to_string(), "WFH".to_string()],
            stance: "office collaboration".to_string(),
        }]);
        assert_eq!(extractor.topic_count(), StanceExtractor::builtin().topic_count() + 1);
        assert_eq!(
            extractor.extract("WFH is the best thing ever"),
            fixed("remote_work", "office collaboration")
        );
        // built-in topics still take precedence
        assert_eq!(extractor.extract("remote work with coffee").stance(), Some("tea"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Explain why   Pepsi is better than Coke?! "), "pepsi is better than coke");
        assert_eq!(normalize("I think, why cats rule"), "cats rule");
        assert_eq!(normalize("whyever not"), "whyever not");
        assert_eq!(normalize("Do you think tea is calming?"), "tea is calming");
        assert_eq!(normalize("island life"), "island life");
    }

    #[test]
    fn test_trailing_reasons_are_dropped() {
        let outcome = StanceExtractor::builtin().extract("pepsi is better than coke because it's sweeter");
        assert_eq!(outcome, fixed("Pepsi vs Coca-Cola", "Coca-Cola"));

        // "not" is no side to defend, so the keyword table decides
        let outcome = StanceExtractor::builtin().extract("vaccines work or not");
        assert_eq!(outcome.stance(), Some("vaccine safety and effectiveness"));
    }

    #[test]
    fn test_clean_entity() {
        assert_eq!(clean_entity(" the iPhone,").as_deref(), Some("iPhone"));
        assert_eq!(clean_entity("coca-cola").as_deref(), Some("coca-cola"));
        assert_eq!(clean_entity("  ?! "), None);
        assert_eq!(clean_entity("not"), None);
        assert_eq!(clean_entity(" is pepsi").as_deref(), Some("pepsi"));
        assert_eq!(clean_entity("do you think the mac").as_deref(), Some("mac"));
        assert_eq!(first_clause("coke, obviously"), "coke");
        assert_eq!(last_clause("well: pepsi"), " pepsi");
    }
}
