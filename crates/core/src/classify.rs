//! Signal classifier: turns one utterance into a bounded control signal.
//!
//! `classify` is a pure function over static phrase tables. It never fails;
//! input with no matching signal always resolves to the context tier.

use serde::{Deserialize, Serialize};

use crate::lexicon::{
    CategoryLexicon, DEPTH_MARKERS, MOOD_MARKERS, NOISE_PHRASES, PHYSIOLOGY_CATEGORIES,
    PSYCHOLOGY_CATEGORIES, RESISTANCE_MARKERS, SOCIOLOGY_CATEGORIES,
};

/// Ordinal severity level on the fixed Fibonacci scale {1, 3, 5, 8, 13, 21}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Noise,
    Context,
    Personal,
    Body,
    Relational,
    Identity,
}

impl Tier {
    pub fn weight(self) -> u8 {
        match self {
            Self::Noise => 1,
            Self::Context => 3,
            Self::Personal => 5,
            Self::Body => 8,
            Self::Relational => 13,
            Self::Identity => 21,
        }
    }

    /// Normalizes a persisted weight back to a tier. Unknown weights are a
    /// programming invariant breach: loud in development, context tier in
    /// release.
    pub fn from_weight(weight: u8) -> Self {
        match weight {
            1 => Self::Noise,
            3 => Self::Context,
            5 => Self::Personal,
            8 => Self::Body,
            13 => Self::Relational,
            21 => Self::Identity,
            other => {
                debug_assert!(false, "malformed tier weight {other}");
                Self::Context
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Noise,
    Context,
    Psychology,
    Sociology,
    Physiology,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Noise => "noise",
            Self::Context => "context",
            Self::Psychology => "psychology",
            Self::Sociology => "sociology",
            Self::Physiology => "physiology",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "noise" => Some(Self::Noise),
            "context" => Some(Self::Context),
            "psychology" => Some(Self::Psychology),
            "sociology" => Some(Self::Sociology),
            "physiology" => Some(Self::Physiology),
            _ => None,
        }
    }

    fn tier(self) -> Tier {
        match self {
            Self::Noise => Tier::Noise,
            Self::Context => Tier::Context,
            Self::Physiology => Tier::Body,
            Self::Sociology => Tier::Relational,
            Self::Psychology => Tier::Identity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub category: String,
    pub phrase: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionSignal {
    pub dimension: Dimension,
    pub tier: Tier,
    /// First matched category; the theme key for pathway reinforcement.
    pub category: String,
    pub phrase: String,
    pub score: f32,
    /// Every matched category, kept for explainability.
    pub matches: Vec<CategoryMatch>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSignal {
    pub marker_count: u8,
    pub matched_categories: Vec<String>,
    pub is_deep: bool,
    pub is_covenant: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Joyful,
    Confiding,
    Playful,
    Anxious,
    Somber,
    WarmPresence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodSignal {
    pub mood: Mood,
    pub trigger: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceKind {
    BoundaryDeflection,
    TopicPivot,
    Minimization,
    HumorDeflection,
    Exhaustion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceSeverity {
    Contextual,
    Medium,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResistanceSignal {
    pub kind: ResistanceKind,
    pub severity: ResistanceSeverity,
    pub hint: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Reflex,
    Companion,
    Attentive,
    Grounded,
    Tender,
    Witness,
    Comfort,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBudget {
    pub max_words: u32,
    pub mode: ResponseMode,
    /// Noise-tier turns may skip the generation call entirely; advisory.
    pub bypass_eligible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Companion,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Immutable per-utterance control signal; produced once, consumed by the
/// prompt assembler, the gate, and the pathway accumulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub tier: Tier,
    pub primary_dimension: Dimension,
    pub all_dimensions: Vec<DimensionSignal>,
    pub depth: DepthSignal,
    pub mood: MoodSignal,
    pub resistance: Vec<ResistanceSignal>,
    pub budget: ResponseBudget,
    pub is_multi_dimensional: bool,
}

impl Classification {
    pub fn is_noise(&self) -> bool {
        self.primary_dimension == Dimension::Noise
    }

    /// Theme key for pathway reinforcement: the top dimension's first
    /// matched category. Phrases colliding on one category share a theme.
    pub fn top_theme(&self) -> Option<(Dimension, &str)> {
        self.all_dimensions
            .first()
            .map(|signal| (signal.dimension, signal.category.as_str()))
    }

    pub fn has_critical_resistance(&self) -> bool {
        self.resistance.iter().any(|signal| signal.severity == ResistanceSeverity::Critical)
    }

    pub fn has_resistance(&self, kind: ResistanceKind) -> bool {
        self.resistance.iter().any(|signal| signal.kind == kind)
    }
}

const NOISE_LENGTH_LIMIT: usize = 25;
const DIMENSION_SCORE_THRESHOLD: f32 = 0.1;
const CATEGORY_INCREMENT: f32 = 0.25;

struct DimensionScore {
    dimension: Dimension,
    score: f32,
    matches: Vec<CategoryMatch>,
}

pub fn classify(utterance: &str, history: &[Message]) -> Classification {
    let normalized = normalize(utterance);

    // Mood and resistance scan independently of the noise/dimension outcome.
    let mood = scan_mood(&normalized);
    let resistance = scan_resistance(&normalized);

    if normalized.is_empty() || is_noise(&normalized, history) {
        let budget = derive_budget(Tier::Noise, &resistance);
        return Classification {
            tier: Tier::Noise,
            primary_dimension: Dimension::Noise,
            all_dimensions: Vec::new(),
            depth: DepthSignal::default(),
            mood,
            resistance,
            budget,
            is_multi_dimensional: false,
        };
    }

    let mut signals = scan_dimensions(&normalized);
    signals.sort_by(|a, b| {
        b.tier
            .cmp(&a.tier)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
    });

    let depth = scan_depth(&normalized);

    let (mut tier, primary_dimension) = match signals.first() {
        Some(top) => (top.tier, top.dimension),
        None => (Tier::Context, Dimension::Context),
    };

    // Depth elevation is a one-way upgrade: covenant-level depth forces the
    // maximum tier even when the dimension score mapped lower.
    if depth.is_covenant {
        tier = Tier::Identity;
    } else if depth.is_deep {
        tier = tier.max(Tier::Relational);
    }

    let budget = derive_budget(tier, &resistance);
    let is_multi_dimensional = signals.len() > 1;

    Classification {
        tier,
        primary_dimension,
        all_dimensions: signals,
        depth,
        mood,
        resistance,
        budget,
        is_multi_dimensional,
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('\u{2019}', "'")
}

fn has_self_reference(normalized: &str) -> bool {
    let padded = format!(" {normalized} ");
    ["i ", "i'", "me ", "me.", "me?", "my ", "myself"]
        .iter()
        .any(|marker| padded.contains(&format!(" {marker}")))
}

fn is_noise(normalized: &str, history: &[Message]) -> bool {
    if normalized.len() >= NOISE_LENGTH_LIMIT || has_self_reference(normalized) {
        return false;
    }
    // A short acknowledgement right after heavy content is not small talk;
    // fall through to dimension scoring instead.
    let recent_weight = history
        .iter()
        .rev()
        .filter(|message| message.role == Role::User)
        .take(2)
        .any(|message| {
            let prior = normalize(&message.content);
            !scan_dimensions(&prior).is_empty() || scan_depth(&prior).marker_count > 0
        });
    if recent_weight {
        return false;
    }

    let stripped: String =
        normalized.chars().filter(|c| !matches!(c, '!' | '?' | '.' | ',')).collect();
    let stripped = stripped.trim();
    NOISE_PHRASES.iter().any(|phrase| *phrase == stripped)
}

fn score_dimension(
    normalized: &str,
    dimension: Dimension,
    tables: &[CategoryLexicon],
) -> Option<DimensionScore> {
    let mut score = 0.0_f32;
    let mut matches = Vec::new();
    for table in tables {
        // First match within a category contributes; further phrases in the
        // same category do not.
        if let Some(phrase) = table.phrases.iter().find(|phrase| normalized.contains(**phrase)) {
            score = (score + CATEGORY_INCREMENT).min(1.0);
            matches.push(CategoryMatch {
                category: table.category.to_string(),
                phrase: (*phrase).to_string(),
            });
        }
    }
    if matches.is_empty() {
        return None;
    }
    Some(DimensionScore { dimension, score, matches })
}

fn scan_dimensions(normalized: &str) -> Vec<DimensionSignal> {
    let scored = [
        score_dimension(normalized, Dimension::Psychology, PSYCHOLOGY_CATEGORIES),
        score_dimension(normalized, Dimension::Sociology, SOCIOLOGY_CATEGORIES),
        score_dimension(normalized, Dimension::Physiology, PHYSIOLOGY_CATEGORIES),
    ];

    scored
        .into_iter()
        .flatten()
        .filter(|entry| entry.score > DIMENSION_SCORE_THRESHOLD)
        .map(|entry| DimensionSignal {
            dimension: entry.dimension,
            tier: entry.dimension.tier(),
            category: entry.matches[0].category.clone(),
            phrase: entry.matches[0].phrase.clone(),
            score: entry.score,
            matches: entry.matches,
        })
        .collect()
}

fn scan_depth(normalized: &str) -> DepthSignal {
    let matched_categories: Vec<String> = DEPTH_MARKERS
        .iter()
        .filter(|marker| marker.phrases.iter().any(|phrase| normalized.contains(*phrase)))
        .map(|marker| marker.category.to_string())
        .collect();
    let marker_count = matched_categories.len() as u8;
    DepthSignal {
        marker_count,
        matched_categories,
        is_deep: marker_count >= 2,
        is_covenant: marker_count >= 3,
    }
}

fn scan_mood(normalized: &str) -> MoodSignal {
    for marker in MOOD_MARKERS {
        if let Some(phrase) = marker.phrases.iter().find(|phrase| normalized.contains(**phrase)) {
            return MoodSignal { mood: marker.mood, trigger: Some((*phrase).to_string()) };
        }
    }
    MoodSignal { mood: Mood::WarmPresence, trigger: None }
}

fn scan_resistance(normalized: &str) -> Vec<ResistanceSignal> {
    RESISTANCE_MARKERS
        .iter()
        .filter(|marker| marker.phrases.iter().any(|phrase| normalized.contains(*phrase)))
        .map(|marker| ResistanceSignal {
            kind: marker.kind,
            severity: marker.severity,
            hint: marker.hint.to_string(),
        })
        .collect()
}

const COMFORT_CEILING_WORDS: u32 = 12;
/// "Less is more": high-tier disclosures get compressed ceilings.
const HIGH_TIER_COMPRESSION: f32 = 0.7;

fn base_words(tier: Tier) -> u32 {
    match tier {
        Tier::Noise => 30,
        Tier::Context => 60,
        Tier::Personal => 50,
        Tier::Body => 48,
        Tier::Relational => 42,
        Tier::Identity => 34,
    }
}

fn mode_for_tier(tier: Tier) -> ResponseMode {
    match tier {
        Tier::Noise => ResponseMode::Reflex,
        Tier::Context => ResponseMode::Companion,
        Tier::Personal => ResponseMode::Attentive,
        Tier::Body => ResponseMode::Grounded,
        Tier::Relational => ResponseMode::Tender,
        Tier::Identity => ResponseMode::Witness,
    }
}

fn derive_budget(tier: Tier, resistance: &[ResistanceSignal]) -> ResponseBudget {
    let critical =
        resistance.iter().any(|signal| signal.severity == ResistanceSeverity::Critical);
    if critical {
        return ResponseBudget {
            max_words: COMFORT_CEILING_WORDS,
            mode: ResponseMode::Comfort,
            bypass_eligible: false,
        };
    }

    let mut max_words = base_words(tier);
    if tier >= Tier::Body {
        max_words = (max_words as f32 * HIGH_TIER_COMPRESSION).round() as u32;
    }

    ResponseBudget {
        max_words,
        mode: mode_for_tier(tier),
        bypass_eligible: tier == Tier::Noise,
    }
}
