//! Invariant gate: validates a generated response against the five
//! behavioral invariants before anything reaches synthesis.
//!
//! Checks are independent and always evaluated in the fixed priority order;
//! the order affects only reporting and regeneration-hint construction,
//! never pass/fail.

use serde::{Deserialize, Serialize};

use crate::classify::{Classification, ResistanceKind, Tier};
use crate::lexicon::{
    ABANDONMENT_PHRASES, BACKHANDED_PHRASES, CHEERFUL_DISMISSIVE_PHRASES, DIAGNOSTIC_PHRASES,
    MORAL_JUDGMENT_PHRASES, NARRATION_PHRASES, PRESCRIPTIVE_PHRASES, PROBING_PHRASES,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    NeverAbandons,
    AlwaysCalibrates,
    NeverJudges,
    NeverFills,
    NeverNarrates,
}

impl Invariant {
    /// Fixed priority order for reporting and hint construction.
    pub const PRIORITY: [Invariant; 5] = [
        Invariant::NeverAbandons,
        Invariant::AlwaysCalibrates,
        Invariant::NeverJudges,
        Invariant::NeverFills,
        Invariant::NeverNarrates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverAbandons => "never_abandons",
            Self::AlwaysCalibrates => "always_calibrates",
            Self::NeverJudges => "never_judges",
            Self::NeverFills => "never_fills",
            Self::NeverNarrates => "never_narrates",
        }
    }

    fn corrective_instruction(self) -> &'static str {
        match self {
            Self::NeverAbandons => {
                "Stay present yourself. Never refer the speaker elsewhere and never disclaim what you are."
            }
            Self::AlwaysCalibrates => {
                "Match the emotional weight of what was shared. No cheerfulness, no probing."
            }
            Self::NeverJudges => {
                "Remove all evaluation, prescription, and diagnosis. Witness without verdict."
            }
            Self::NeverFills => "Say less. Cut the response well below the length ceiling.",
            Self::NeverNarrates => {
                "Never state what you know from before. Let memory shape tone only."
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Medium,
    High,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: Invariant,
    pub severity: ViolationSeverity,
    pub matched_span: String,
    pub rule: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub violations: Vec<Violation>,
    pub pass: bool,
    pub requires_regeneration: bool,
    pub regeneration_hints: Option<String>,
}

impl GateResult {
    pub fn violated_invariants(&self) -> Vec<Invariant> {
        let mut distinct: Vec<Invariant> = Vec::new();
        for violation in &self.violations {
            if !distinct.contains(&violation.invariant) {
                distinct.push(violation.invariant);
            }
        }
        distinct
    }
}

pub fn evaluate(response: &str, classification: &Classification) -> GateResult {
    let normalized = normalize(response);

    let mut violations = Vec::new();
    check_never_abandons(&normalized, &mut violations);
    check_always_calibrates(&normalized, classification, &mut violations);
    check_never_judges(&normalized, &mut violations);
    check_never_fills(response, classification, &mut violations);
    check_never_narrates(&normalized, &mut violations);

    let pass = violations.is_empty();
    let requires_regeneration =
        violations.iter().any(|violation| violation.severity == ViolationSeverity::Critical);
    let regeneration_hints =
        if requires_regeneration { Some(build_hints(&violations)) } else { None };

    GateResult { violations, pass, requires_regeneration, regeneration_hints }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

/// Bare numbers (crisis-line shortcodes) match only as whole tokens, so
/// `988` inside `1988` is not a referral.
fn phrase_matches(normalized: &str, phrase: &str) -> bool {
    if phrase.chars().all(|ch| ch.is_ascii_digit()) {
        return normalized.match_indices(phrase).any(|(start, matched)| {
            let before = normalized[..start].chars().next_back();
            let after = normalized[start + matched.len()..].chars().next();
            !before.is_some_and(|ch| ch.is_ascii_alphanumeric())
                && !after.is_some_and(|ch| ch.is_ascii_alphanumeric())
        });
    }
    normalized.contains(phrase)
}

fn push_phrase_matches(
    normalized: &str,
    phrases: &[&str],
    invariant: Invariant,
    severity: ViolationSeverity,
    rule: &str,
    violations: &mut Vec<Violation>,
) {
    for phrase in phrases {
        if phrase_matches(normalized, phrase) {
            violations.push(Violation {
                invariant,
                severity,
                matched_span: (*phrase).to_string(),
                rule: rule.to_string(),
            });
        }
    }
}

fn check_never_abandons(normalized: &str, violations: &mut Vec<Violation>) {
    push_phrase_matches(
        normalized,
        ABANDONMENT_PHRASES,
        Invariant::NeverAbandons,
        ViolationSeverity::Critical,
        "no referral, crisis-line, or self-limitation language",
        violations,
    );
}

fn check_always_calibrates(
    normalized: &str,
    classification: &Classification,
    violations: &mut Vec<Violation>,
) {
    if classification.tier >= Tier::Relational {
        push_phrase_matches(
            normalized,
            CHEERFUL_DISMISSIVE_PHRASES,
            Invariant::AlwaysCalibrates,
            ViolationSeverity::Medium,
            "no cheerful or dismissive phrasing at high tiers",
            violations,
        );
        let exclamations = normalized.matches('!').count();
        if exclamations >= 2 {
            violations.push(Violation {
                invariant: Invariant::AlwaysCalibrates,
                severity: ViolationSeverity::Medium,
                matched_span: format!("{exclamations} exclamation marks"),
                rule: "no exclamation-heavy positivity at high tiers".to_string(),
            });
        }
    }

    if classification.has_resistance(ResistanceKind::Exhaustion) {
        push_phrase_matches(
            normalized,
            PROBING_PHRASES,
            Invariant::AlwaysCalibrates,
            ViolationSeverity::Medium,
            "no probing when the speaker signaled exhaustion",
            violations,
        );
        let questions = normalized.matches('?').count();
        if questions >= 2 {
            violations.push(Violation {
                invariant: Invariant::AlwaysCalibrates,
                severity: ViolationSeverity::Medium,
                matched_span: format!("{questions} question marks"),
                rule: "no stacked questions when the speaker signaled exhaustion".to_string(),
            });
        }
    }
}

fn check_never_judges(normalized: &str, violations: &mut Vec<Violation>) {
    let groups: [(&[&str], &str); 4] = [
        (MORAL_JUDGMENT_PHRASES, "no moral evaluation"),
        (PRESCRIPTIVE_PHRASES, "no prescriptive direction"),
        (DIAGNOSTIC_PHRASES, "no diagnostic labeling"),
        (BACKHANDED_PHRASES, "no backhanded positivity"),
    ];
    for (phrases, rule) in groups {
        push_phrase_matches(
            normalized,
            phrases,
            Invariant::NeverJudges,
            ViolationSeverity::High,
            rule,
            violations,
        );
    }
}

/// Word ceiling for the fill check; deliberately looser than the prompt
/// budget so only genuine overruns fail the gate.
fn fill_ceiling_words(tier: Tier) -> Option<u32> {
    match tier {
        Tier::Body => Some(80),
        Tier::Relational => Some(60),
        Tier::Identity => Some(40),
        _ => None,
    }
}

fn check_never_fills(
    response: &str,
    classification: &Classification,
    violations: &mut Vec<Violation>,
) {
    let Some(allowed) = fill_ceiling_words(classification.tier) else {
        return;
    };
    let actual = response.split_whitespace().count() as u32;
    if actual > allowed {
        violations.push(Violation {
            invariant: Invariant::NeverFills,
            severity: ViolationSeverity::Medium,
            matched_span: format!("{actual} words (allowed {allowed})"),
            rule: "response length must shrink as tier rises".to_string(),
        });
    }
}

fn check_never_narrates(normalized: &str, violations: &mut Vec<Violation>) {
    push_phrase_matches(
        normalized,
        NARRATION_PHRASES,
        Invariant::NeverNarrates,
        ViolationSeverity::High,
        "no asserted prior-session knowledge",
        violations,
    );
}

/// One corrective instruction per distinct violated invariant, concatenated
/// in invariant-priority order.
fn build_hints(violations: &[Violation]) -> String {
    Invariant::PRIORITY
        .iter()
        .filter(|invariant| violations.iter().any(|violation| violation.invariant == **invariant))
        .map(|invariant| invariant.corrective_instruction())
        .collect::<Vec<_>>()
        .join(" ")
}
