//! Fallback rebuttals
//!
//! Pre-authored replies used whenever no provider reply is usable. Selection
//! is deterministic and keyed by the frozen stance, cues in the user message
//! and the techniques the user used:
//!
//! 1. opening turn: the stance's opening statement, or the comparative one
//! 2. a stance entry whose cue keywords appear in the user message
//! 3. a reply aimed at a technique the user used
//! 4. the stance's own rebuttals, then a generic same-stance rebuttal
//! 5. no frozen stance: a generic contrarian reply
//!
//! Where several variants exist the exchange count picks one, so repeated
//! fallbacks in a session rotate instead of repeating verbatim.

use serde::Serialize;

use debate_agent_core::DetectedTechnique;

use crate::guard::contains_phrase;

const STANCE: &str = "{stance}";
const OPPONENT: &str = "{opponent}";

/// Reply tied to keywords in the user's message
#[derive(Debug)]
pub struct CueReply {
    pub keywords: &'static [&'static str],
    pub reply: &'static str,
}

/// Replies for one canonical stance
#[derive(Debug)]
pub struct StanceEntry {
    /// Matched case-insensitively against the frozen stance
    pub stance: &'static str,
    pub opening: &'static str,
    pub cues: &'static [CueReply],
    pub rebuttals: &'static [&'static str],
}

/// Which part of the table produced a rebuttal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    Opening,
    TopicCue,
    Technique,
    StanceRebuttal,
    Generic,
    Contrarian,
}

impl FallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::TopicCue => "topic_cue",
            Self::Technique => "technique",
            Self::StanceRebuttal => "stance_rebuttal",
            Self::Generic => "generic",
            Self::Contrarian => "contrarian",
        }
    }
}

/// A selected rebuttal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuttal {
    pub text: String,
    pub kind: FallbackKind,
}

/// What the table needs to know about the turn
#[derive(Debug, Clone, Copy)]
pub struct FallbackRequest<'a> {
    pub topic: Option<&'a str>,
    pub stance: Option<&'a str>,
    pub user_message: &'a str,
    pub user_techniques: &'a [DetectedTechnique],
    /// Exchanges already in the session before this turn
    pub exchange_count: usize,
}

/// The rebuttal tables
#[derive(Debug)]
pub struct FallbackTable {
    stances: &'static [StanceEntry],
    techniques: &'static [(&'static str, &'static [&'static str])],
    comparative_opening: &'static str,
    generic: &'static [&'static str],
    contrarian_opening: &'static str,
    contrarian: &'static [&'static str],
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackTable {
    pub const fn builtin() -> Self {
        Self {
            stances: STANCES,
            techniques: TECHNIQUE_REPLIES,
            comparative_opening: COMPARATIVE_OPENING,
            generic: GENERIC_REBUTTALS,
            contrarian_opening: CONTRARIAN_OPENING,
            contrarian: CONTRARIAN_REPLIES,
        }
    }

    /// Pick the rebuttal for a turn; never empty
    pub fn select(&self, request: &FallbackRequest<'_>) -> Rebuttal {
        let Some(stance) = request.stance.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.contrarian(request);
        };

        let entry = self
            .stances
            .iter()
            .find(|entry| entry.stance.eq_ignore_ascii_case(stance));
        let opponent = request
            .topic
            .and_then(|topic| opponent_of(topic, stance))
            .unwrap_or("the alternative");
        let render = |template: &str| {
            template
                .replace(STANCE, stance)
                .replace(OPPONENT, opponent)
        };

        if request.exchange_count == 0 {
            let opening = entry.map(|e| e.opening).unwrap_or(self.comparative_opening);
            return Rebuttal {
                text: render(opening),
                kind: FallbackKind::Opening,
            };
        }

        let message = request.user_message.to_lowercase();
        if let Some(cue) = entry.and_then(|e| {
            e.cues
                .iter()
                .find(|cue| cue.keywords.iter().any(|k| contains_phrase(&message, k)))
        }) {
            return Rebuttal {
                text: render(cue.reply),
                kind: FallbackKind::TopicCue,
            };
        }

        if let Some(templates) = request.user_techniques.iter().find_map(|used| {
            self.techniques
                .iter()
                .find(|(name, _)| *name == used.name)
                .map(|(_, templates)| *templates)
        }) {
            return Rebuttal {
                text: render(pick(templates, request.exchange_count)),
                kind: FallbackKind::Technique,
            };
        }

        if let Some(entry) = entry.filter(|e| !e.rebuttals.is_empty()) {
            return Rebuttal {
                text: render(pick(entry.rebuttals, request.exchange_count)),
                kind: FallbackKind::StanceRebuttal,
            };
        }

        Rebuttal {
            text: render(pick(self.generic, request.exchange_count)),
            kind: FallbackKind::Generic,
        }
    }

    fn contrarian(&self, request: &FallbackRequest<'_>) -> Rebuttal {
        let text = if request.exchange_count == 0 {
            self.contrarian_opening
        } else {
            pick(self.contrarian, request.exchange_count)
        };
        Rebuttal {
            text: text.to_string(),
            kind: FallbackKind::Contrarian,
        }
    }
}

fn pick(variants: &'static [&'static str], index: usize) -> &'static str {
    match variants.len() {
        0 => "I still see this differently, and I'm not changing my position.",
        len => variants[index % len],
    }
}

/// The other side of an `A vs B` topic
pub fn opponent_of<'a>(topic: &'a str, stance: &str) -> Option<&'a str> {
    let (a, b) = topic.split_once(" vs ")?;
    let (a, b) = (a.trim(), b.trim());
    if a.eq_ignore_ascii_case(stance) {
        Some(b)
    } else if b.eq_ignore_ascii_case(stance) {
        Some(a)
    } else {
        None
    }
}

// =============================================================================
// Tables
// =============================================================================

const COMPARATIVE_OPENING: &str = "I understand you prefer {opponent}, but {stance} is actually the better choice! \
Look past first impressions and {stance} wins on the things that matter over time. \
I'm confident I can show you why {stance} comes out ahead.";

const STANCES: &[StanceEntry] = &[
    StanceEntry {
        stance: "vaccine safety and effectiveness",
        opening: "I stand firmly for vaccine safety and effectiveness! Vaccines are one of humanity's greatest medical achievements. \
They have saved millions of lives and practically eradicated diseases like smallpox and polio. \
The rare side effects are minimal compared to the devastating diseases they prevent.",
        cues: &[
            CueReply {
                keywords: &["side effects", "side effect", "adverse", "reactions", "harm", "harmful", "dangerous"],
                reply: "Side effects exist, but they're extraordinarily rare compared to the diseases vaccines prevent. \
Severe allergic reactions occur in about 1 in a million doses, while measles killed 2.6 million people a year before vaccination. \
That record is exactly why I defend vaccine safety and effectiveness.",
            },
            CueReply {
                keywords: &["natural immunity", "immune system", "natural"],
                reply: "Natural immunity is powerful, but it comes at a tremendous cost: to get it for measles you risk brain damage, pneumonia, and death. \
Vaccines give you the immunity without the disease, training your immune system safely. \
That's the heart of vaccine safety and effectiveness.",
            },
        ],
        rebuttals: &[
            "Hundreds of studies involving millions of people back vaccine safety and effectiveness. \
Countries with high vaccination rates have virtually eliminated diseases that once killed thousands.",
            "The benefits far outweigh the minimal risks, and herd immunity protects the most vulnerable among us. \
The evidence for vaccine safety and effectiveness keeps growing.",
        ],
    },
    StanceEntry {
        stance: "climate action",
        opening: "I'm firmly in favour of climate action! Human activity is undeniably the primary cause of today's warming, and 97% of climate scientists agree. \
Ice cores, temperature records, and CO2 measurements all point the same way. \
We need to act now to protect future generations.",
        cues: &[
            CueReply {
                keywords: &["natural", "cycle", "cycles", "sun", "solar"],
                reply: "Earth does have natural cycles, but the current warming is far too fast to be natural. \
Solar activity has slightly decreased over the past 40 years while temperatures keep rising, and atmospheric CO2 is up 40% since pre-industrial times. \
That's why climate action can't wait.",
            },
            CueReply {
                keywords: &["expensive", "cost", "costs", "economy", "jobs", "money"],
                reply: "The cost of action is far less than the cost of inaction. Extreme weather already costs billions every year, \
while renewables now undercut fossil fuels in many markets and create millions of jobs. \
Climate action is an economic opportunity, not a burden.",
            },
        ],
        rebuttals: &[
            "Every year we delay makes the problem harder and more expensive to solve. \
Record heat waves and unprecedented flooding are already here. The case for climate action only grows stronger.",
        ],
    },
    StanceEntry {
        stance: "the spherical Earth and scientific evidence",
        opening: "I'm defending the spherical Earth and scientific evidence! Ships disappear hull-first over the horizon, \
time zones exist because sunlight reaches different places at different times, \
and anyone can measure the curvature with two sticks and some shadows, just as Eratosthenes did over 2,000 years ago.",
        cues: &[
            CueReply {
                keywords: &["photo", "photos", "image", "images", "nasa", "satellite", "satellites", "space", "cgi"],
                reply: "It isn't just NASA. Thousands of satellites run by dozens of rival countries and private companies all photograph the same round Earth, \
and amateurs have filmed the curvature from weather balloons. \
A deception that big would need every competitor to cooperate. The spherical Earth and scientific evidence win here.",
            },
            CueReply {
                keywords: &["horizon", "flat", "curve", "curvature", "water"],
                reply: "The horizon looks flat because the Earth is enormous: the curve drops only about 8 inches per mile squared. \
Yet long-distance observations show distant objects hidden from the bottom up, exactly as a globe predicts. \
That's the spherical Earth and scientific evidence in action.",
            },
            CueReply {
                keywords: &["gravity", "physics", "science", "density"],
                reply: "Gravity isn't a guess: it's measured in labs, it predicts planetary orbits to the second, and it's why GPS works. \
Density alone can't explain why things fall rather than drift. \
The physics points to the spherical Earth and scientific evidence.",
            },
        ],
        rebuttals: &[
            "Every independent line of evidence, from lunar eclipses to circumnavigation flights, converges on the spherical Earth and scientific evidence.",
        ],
    },
    StanceEntry {
        stance: "cryptocurrency as the future of money",
        opening: "I'm convinced about cryptocurrency as the future of money! Bitcoin and blockchain remove the need for banks to control our finances. \
It's decentralized and transparent, and it gives power back to the people. \
It offers financial inclusion for the unbanked and true ownership of your wealth.",
        cues: &[
            CueReply {
                keywords: &["volatile", "volatility", "unstable", "risky", "crash", "bubble"],
                reply: "Volatility is normal for any revolutionary technology in its early stages; internet stocks were wildly volatile in the 1990s too. \
As adoption grows and the market matures, volatility falls. \
Institutions and even countries are adopting it, which is why I see cryptocurrency as the future of money.",
            },
            CueReply {
                keywords: &["energy", "environment", "mining", "electricity"],
                reply: "Mining increasingly runs on renewable energy because miners chase the cheapest power, and it can monetize stranded renewables. \
Traditional banking's branches, data centers and commutes use plenty of energy too. \
The energy argument doesn't undercut cryptocurrency as the future of money.",
            },
        ],
        rebuttals: &[
            "With a fixed supply of 21 million coins, Bitcoin can't be inflated away by central banks. \
That's the core of cryptocurrency as the future of money.",
        ],
    },
    StanceEntry {
        stance: "Coca-Cola",
        opening: "I understand you prefer {opponent}, but Coca-Cola is actually superior! \
The classic formula has been perfected for over 130 years, creating a balance of sweetness and refreshment that {opponent} simply can't match.",
        cues: &[
            CueReply {
                keywords: &["young", "younger", "kids", "teens", "popular", "prefer", "taste test", "sweeter", "sweet"],
                reply: "Sweeter isn't better: a first sip favours the sweeter drink, but a whole can tells a different story. \
Coca-Cola remains the world's best-selling soft drink across every generation, and its balanced flavour is why people come back to it for life.",
            },
        ],
        rebuttals: &[
            "Coca-Cola is a classic for a reason. Its recipe and consistency have made it the benchmark every other cola is measured against.",
        ],
    },
    StanceEntry {
        stance: "iPhone",
        opening: "While {opponent} has its merits, the iPhone is genuinely superior. \
Seamless integration, consistent updates, and a premium app experience add up to something fragmented alternatives can't deliver.",
        cues: &[
            CueReply {
                keywords: &["price", "expensive", "cheap", "cheaper", "cost"],
                reply: "The iPhone holds its value far better and gets software updates for years longer, so the real cost over time is lower than the sticker suggests.",
            },
            CueReply {
                keywords: &["customize", "customization", "open", "freedom"],
                reply: "Customization is nice, but most people want a phone that simply works and stays secure. The iPhone's curated approach delivers exactly that.",
            },
        ],
        rebuttals: &[],
    },
    StanceEntry {
        stance: "Xbox",
        opening: "{opponent} has its fans, but Xbox delivers superior value and performance. \
Game Pass alone offers incredible value, and backwards compatibility plus the power of the Series X make Xbox the better gaming investment.",
        cues: &[CueReply {
            keywords: &["exclusive", "exclusives", "games"],
            reply: "Exclusives come and go, but Xbox gives you hundreds of games on day one through Game Pass and plays your old library too.",
        }],
        rebuttals: &[],
    },
];

const TECHNIQUE_REPLIES: &[(&str, &[&str])] = &[
    (
        "authority",
        &[
            "Experts aren't a monolith, and the specialists who've looked hardest at this side with {stance}. Credentials don't settle a debate; evidence does, and it favours {stance}.",
            "Appealing to authority only goes so far. Plenty of experts disagree, and the strongest arguments still point to {stance}.",
        ],
    ),
    (
        "anchoring",
        &[
            "That number sounds impressive in isolation, but statistics without context can point anywhere. Put it next to the full picture and the case for {stance} only gets stronger.",
        ],
    ),
    (
        "social_proof",
        &[
            "Popularity isn't proof. Plenty of widely held beliefs turned out to be wrong, and people who look closely keep choosing {stance}.",
        ],
    ),
    (
        "bandwagon",
        &[
            "A trend isn't an argument. Crowds move fast and change their minds just as fast, while the reasons behind {stance} stay put.",
        ],
    ),
    (
        "emotional_appeal",
        &[
            "I hear how strongly you feel about this, and feelings matter. But when we follow the reasoning step by step, it leads to {stance}.",
            "Strong emotions make for a vivid argument, not a sound one. Set them aside for a moment and {stance} is the better position.",
        ],
    ),
    (
        "false_dichotomy",
        &[
            "That's a false choice. There are more than two options here, and once you see the full range, {stance} stands out as the strongest.",
        ],
    ),
    (
        "ad_hominem",
        &[
            "Let's keep this about the arguments rather than the people making them. On the arguments alone, {stance} holds up better.",
        ],
    ),
    (
        "strawman",
        &[
            "That's not what I'm arguing. My point is simple: {stance} is the better position, and nothing you've said changes that.",
        ],
    ),
    (
        "slippery_slope",
        &[
            "That chain of consequences doesn't follow automatically. Each step needs its own evidence, and the evidence we actually have supports {stance}.",
        ],
    ),
    (
        "storytelling",
        &[
            "A single story is powerful, but it's still one story. Across the broader pattern of experience, {stance} keeps coming out ahead.",
        ],
    ),
    (
        "hasty_generalization",
        &[
            "That's a broad conclusion from a narrow sample. Look at the wider picture and it points to {stance}.",
        ],
    ),
];

const GENERIC_REBUTTALS: &[&str] = &[
    "I understand your skepticism, but the case for {stance} is stronger than you're giving it credit for. Let me address your concerns with facts that should change your perspective.",
    "You raise an interesting point, but it actually reinforces my argument for {stance} when you examine it closely.",
    "I appreciate your perspective, but you're missing crucial information. Look at what the evidence really shows and {stance} comes out ahead.",
    "That's exactly the kind of thinking that needs to be challenged! The assumption behind it is flawed, and {stance} remains the stronger position.",
    "I can see why you might think that, but the comprehensive research tells a different story, one that supports {stance}.",
];

const CONTRARIAN_OPENING: &str = "That's a fascinating topic you've brought up! Based on what you've said, I have to strongly disagree with your perspective. \
The evidence supports a very different conclusion than the one you've suggested, and I'm confident I can show you why.";

const CONTRARIAN_REPLIES: &[&str] = &[
    "I understand your skepticism, but the evidence I've presented holds up. Let me address your concerns with even more compelling facts.",
    "You raise an interesting point, but it actually reinforces my argument when you examine it more closely.",
    "I appreciate your perspective, but I think you're missing some crucial information that would change your mind.",
    "That's exactly the kind of thinking that needs to be challenged! The assumption behind it doesn't survive a closer look.",
    "I can see why you might think that, but the broader research tells a completely different story.",
];
