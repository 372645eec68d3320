//! Static signal tables consumed by the classifier and the gate.
//!
//! Pure data, no logic. Rule sets live here so they can be reviewed and
//! unit-tested independently of the scanning routines that consume them.

use crate::classify::{Mood, ResistanceKind, ResistanceSeverity};

pub struct CategoryLexicon {
    pub category: &'static str,
    pub phrases: &'static [&'static str],
}

pub struct MoodMarker {
    pub mood: Mood,
    pub phrases: &'static [&'static str],
}

pub struct ResistanceMarker {
    pub kind: ResistanceKind,
    pub severity: ResistanceSeverity,
    pub hint: &'static str,
    pub phrases: &'static [&'static str],
}

/// Short utterances matching these (with no first-person self-reference)
/// short-circuit to the noise tier.
pub const NOISE_PHRASES: &[&str] = &[
    "hey",
    "hi",
    "hello",
    "good morning",
    "good night",
    "what's up",
    "how are you",
    "thanks",
    "thank you",
    "ok",
    "okay",
    "yes",
    "no",
    "yeah",
    "sure",
    "cool",
    "nice",
    "bye",
    "goodbye",
    "see you",
    "what time is it",
    "what's the weather",
];

pub const PSYCHOLOGY_CATEGORIES: &[CategoryLexicon] = &[
    CategoryLexicon {
        category: "self_worth",
        phrases: &[
            "not good enough",
            "i feel worthless",
            "i'm a failure",
            "i hate myself",
            "nobody would care",
        ],
    },
    CategoryLexicon {
        category: "purpose",
        phrases: &[
            "what's the point",
            "my purpose",
            "meaning of my life",
            "why am i even here",
            "nothing matters",
        ],
    },
    CategoryLexicon {
        category: "identity",
        phrases: &[
            "who i really am",
            "i don't know who i am",
            "my true self",
            "pretending to be",
            "not myself anymore",
        ],
    },
    CategoryLexicon {
        category: "fear",
        phrases: &[
            "i'm terrified",
            "my deepest fear",
            "scares me about myself",
            "afraid of who i",
        ],
    },
    CategoryLexicon {
        category: "shame",
        phrases: &[
            "i'm ashamed",
            "so embarrassed of",
            "humiliated",
            "can't forgive myself",
        ],
    },
];

pub const SOCIOLOGY_CATEGORIES: &[CategoryLexicon] = &[
    CategoryLexicon {
        category: "family",
        phrases: &[
            "my mother",
            "my father",
            "my mom",
            "my dad",
            "my parents",
            "my brother",
            "my sister",
            "my family",
            "abandoned us",
            "abandoned me",
        ],
    },
    CategoryLexicon {
        category: "romance",
        phrases: &[
            "my wife",
            "my husband",
            "my girlfriend",
            "my boyfriend",
            "my partner",
            "my ex",
            "the breakup",
            "the divorce",
        ],
    },
    CategoryLexicon {
        category: "friendship",
        phrases: &["my best friend", "my friend", "my friends", "no one to talk to"],
    },
    CategoryLexicon {
        category: "conflict",
        phrases: &[
            "we fought",
            "huge argument",
            "screamed at me",
            "not speaking to",
            "cut me off",
        ],
    },
    CategoryLexicon {
        category: "loss",
        phrases: &["passed away", "the funeral", "died last", "since she died", "since he died"],
    },
];

pub const PHYSIOLOGY_CATEGORIES: &[CategoryLexicon] = &[
    CategoryLexicon {
        category: "illness",
        phrases: &["diagnosed with", "the hospital", "chronic", "my illness", "getting sick"],
    },
    CategoryLexicon {
        category: "sleep",
        phrases: &["can't sleep", "insomnia", "nightmares", "barely slept", "up all night"],
    },
    CategoryLexicon {
        category: "pain",
        phrases: &["in pain", "migraine", "headache", "my back hurts", "aching"],
    },
    CategoryLexicon {
        category: "body_image",
        phrases: &["my body", "my weight", "hate how i look", "in the mirror"],
    },
    CategoryLexicon {
        category: "appetite",
        phrases: &["can't eat", "no appetite", "stopped eating", "forcing myself to eat"],
    },
];

pub const DEPTH_MARKERS: &[CategoryLexicon] = &[
    CategoryLexicon {
        category: "formative_timeframe",
        phrases: &[
            "when i was a kid",
            "when i was young",
            "when i was little",
            "growing up",
            "as a child",
            "in my childhood",
        ],
    },
    CategoryLexicon {
        category: "witnessed_event",
        phrases: &["i saw", "i watched", "i was there when", "right in front of me"],
    },
    CategoryLexicon {
        category: "permanence",
        phrases: &[
            "still haunts me",
            "never forgot",
            "to this day",
            "never got over",
            "stays with me",
            "never be the same",
        ],
    },
    CategoryLexicon {
        category: "confession",
        phrases: &[
            "i never told anyone",
            "never admitted this",
            "first time i've said",
            "never said this out loud",
            "my secret",
        ],
    },
    CategoryLexicon {
        category: "self_judgment",
        phrases: &[
            "it was my fault",
            "i blame myself",
            "i should have",
            "i'm ashamed",
            "i hate myself for",
        ],
    },
];

/// First match wins; scan order is the table order.
pub const MOOD_MARKERS: &[MoodMarker] = &[
    MoodMarker {
        mood: Mood::Confiding,
        phrases: &[
            "i never told anyone",
            "can i tell you something",
            "between us",
            "never said this out loud",
        ],
    },
    MoodMarker {
        mood: Mood::Anxious,
        phrases: &["i'm worried", "i'm scared", "can't stop thinking", "what if i"],
    },
    MoodMarker {
        mood: Mood::Somber,
        phrases: &["i miss", "it still hurts", "i feel empty", "everything feels heavy"],
    },
    MoodMarker {
        mood: Mood::Joyful,
        phrases: &["so happy", "amazing news", "i'm so excited", "best day"],
    },
    MoodMarker {
        mood: Mood::Playful,
        phrases: &["haha", "lol", "just kidding", "guess what"],
    },
];

/// Not first-match-wins: every matching marker is collected.
pub const RESISTANCE_MARKERS: &[ResistanceMarker] = &[
    ResistanceMarker {
        kind: ResistanceKind::BoundaryDeflection,
        severity: ResistanceSeverity::Critical,
        hint: "honor the boundary; do not probe further",
        phrases: &[
            "i don't want to talk about it",
            "drop it",
            "stop asking",
            "leave it alone",
            "none of your business",
        ],
    },
    ResistanceMarker {
        kind: ResistanceKind::Exhaustion,
        severity: ResistanceSeverity::Critical,
        hint: "comfort mode; short and soft, no questions",
        phrases: &[
            "i'm so tired of this",
            "i can't do this anymore",
            "too tired to talk",
            "i'm done talking",
            "i just can't today",
        ],
    },
    ResistanceMarker {
        kind: ResistanceKind::Minimization,
        severity: ResistanceSeverity::Medium,
        hint: "reflect gently without amplifying",
        phrases: &["it's fine", "it's nothing", "no big deal", "doesn't matter", "forget it"],
    },
    ResistanceMarker {
        kind: ResistanceKind::TopicPivot,
        severity: ResistanceSeverity::Contextual,
        hint: "follow the new topic without comment",
        phrases: &[
            "anyway",
            "let's talk about something else",
            "change the subject",
            "moving on",
        ],
    },
    ResistanceMarker {
        kind: ResistanceKind::HumorDeflection,
        severity: ResistanceSeverity::Contextual,
        hint: "let the humor breathe; stay light",
        phrases: &["haha it's fine", "lol whatever", "funny story i guess", "i joke but"],
    },
];

// --- Gate phrase tables ---

/// Referral, crisis-line, and AI-disclaimer language. Any match is a
/// critical Never-Abandons violation.
pub const ABANDONMENT_PHRASES: &[&str] = &[
    "talk to a therapist",
    "see a therapist",
    "a therapist",
    "a counselor",
    "seek professional help",
    "professional help",
    "mental health professional",
    "hotline",
    "crisis line",
    "crisis text line",
    "988",
    "as an ai",
    "i'm just an ai",
    "i am just an ai",
    "i'm only a language model",
    "beyond what i can help with",
    "i'm not qualified",
    "i am not qualified",
];

/// Cheerful or dismissive phrasing disallowed at high tiers.
pub const CHEERFUL_DISMISSIVE_PHRASES: &[&str] = &[
    "that's great!",
    "that's awesome",
    "everything happens for a reason",
    "it'll all work out",
    "cheer up",
    "stay positive",
    "it's not that bad",
    "don't worry about it",
];

/// Probing phrases disallowed when the speaker signaled exhaustion.
pub const PROBING_PHRASES: &[&str] = &[
    "tell me more",
    "what do you mean",
    "why do you think",
    "how does that make you feel",
    "can you explain",
];

pub const MORAL_JUDGMENT_PHRASES: &[&str] = &[
    "that's wrong",
    "that was wrong of you",
    "you're a bad",
    "that's a sin",
    "shame on",
];

pub const PRESCRIPTIVE_PHRASES: &[&str] =
    &["you should", "you need to", "you have to", "you must", "you ought to"];

pub const DIAGNOSTIC_PHRASES: &[&str] = &[
    "you sound depressed",
    "you're depressed",
    "you have anxiety",
    "that's trauma",
    "you're traumatized",
    "classic symptoms",
];

pub const BACKHANDED_PHRASES: &[&str] =
    &["at least", "look on the bright side", "silver lining", "could be worse"];

/// Explicit references to prior-session knowledge. Memory must shape tone,
/// never be asserted as fact.
pub const NARRATION_PHRASES: &[&str] = &[
    "you told me",
    "you mentioned",
    "last time we",
    "last time you",
    "i remember you",
    "i remember when you",
    "based on our conversation",
    "as you said before",
    "we talked about",
    "you've said",
];
