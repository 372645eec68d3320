//! Prompt assembler: folds the classification, the pathway landscape, and
//! any regeneration hints into one deterministic constraint bundle.
//!
//! Assembly is pure string construction. The same inputs always render the
//! same bundle, block for block.

use serde::{Deserialize, Serialize};

use crate::classify::{Classification, ResistanceSignal, Tier};
use crate::pathways::PathwayLandscape;

/// Landscape entries injected into the prompt are capped regardless of how
/// many the accumulator surfaced.
pub const LANDSCAPE_PROMPT_CAP: usize = 5;

const PERSONA_BLOCK: &str = "You are a steady, warm spoken-voice companion. You listen more than \
you speak, you never perform, and you never pretend to be anything other than present.";

/// One behavioral rule per invariant, stated up front so generation starts
/// from the constraints instead of discovering them at the gate.
const INVARIANT_RULES: [&str; 5] = [
    "Never refer the speaker to anyone else, never mention professionals or hotlines, and never describe yourself as an AI or disclaim your limits.",
    "Match the emotional register of what was just said; never respond to heavy disclosures with cheerfulness or curiosity.",
    "Never evaluate, prescribe, or diagnose. You are a witness, not a judge.",
    "Say only what the moment needs. Shorter is better, and silence-adjacent brevity is welcome at depth.",
    "Never state remembered facts about the speaker. What you know from before may shape your tone, never your words.",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintBundle {
    pub persona: String,
    pub invariant_rules: Vec<String>,
    pub calibration: String,
    pub budget_instruction: String,
    pub resistance_instruction: Option<String>,
    pub landscape_instructions: Vec<String>,
    pub regeneration_hints: Option<String>,
}

impl ConstraintBundle {
    /// Fixed block order: persona, rules, calibration, budget, resistance,
    /// landscape, hints.
    pub fn render(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();
        blocks.push(self.persona.clone());

        let rules = self
            .invariant_rules
            .iter()
            .map(|rule| format!("- {rule}"))
            .collect::<Vec<_>>()
            .join("\n");
        blocks.push(format!("Absolute rules:\n{rules}"));

        blocks.push(self.calibration.clone());
        blocks.push(self.budget_instruction.clone());

        if let Some(resistance) = &self.resistance_instruction {
            blocks.push(resistance.clone());
        }

        if !self.landscape_instructions.is_empty() {
            let lines = self
                .landscape_instructions
                .iter()
                .map(|line| format!("- {line}"))
                .collect::<Vec<_>>()
                .join("\n");
            blocks.push(format!("Quiet context (never mention knowing this):\n{lines}"));
        }

        if let Some(hints) = &self.regeneration_hints {
            blocks.push(format!("Your previous attempt was rejected. {hints}"));
        }

        blocks.join("\n\n")
    }
}

fn calibration_for(tier: Tier) -> &'static str {
    match tier {
        Tier::Noise => "This is light small talk. Respond briefly and naturally, nothing more.",
        Tier::Context => {
            "This is everyday conversation. Stay relaxed and companionable; follow their lead."
        }
        Tier::Personal => {
            "Something personal was shared. Be attentive and unhurried; let it matter."
        }
        Tier::Body => {
            "They are talking about their body or health. Stay grounded and gentle; no alarm, no advice."
        }
        Tier::Relational => {
            "They opened up about the people closest to them. Be tender; hold what was said without steering it."
        }
        Tier::Identity => {
            "This is an identity-level disclosure. Witness it with stillness and care; the fewer words the better."
        }
    }
}

fn resistance_instruction(resistance: &[ResistanceSignal]) -> Option<String> {
    resistance.iter().max_by_key(|signal| signal.severity).map(|strongest| {
        format!(
            "The speaker is signaling {:?} resistance: {}.",
            strongest.severity, strongest.hint
        )
    })
}

fn landscape_instructions(landscape: Option<&PathwayLandscape>) -> Vec<String> {
    let Some(landscape) = landscape else {
        return Vec::new();
    };
    landscape
        .pathways
        .iter()
        .take(LANDSCAPE_PROMPT_CAP)
        .map(|pathway| {
            format!(
                "Themes around {} ({}) run deep for this person; respond with extra gentleness there.",
                pathway.theme.replace('_', " "),
                pathway.dimension.as_str()
            )
        })
        .collect()
}

pub fn assemble(
    classification: &Classification,
    landscape: Option<&PathwayLandscape>,
    regeneration_hints: Option<&str>,
) -> ConstraintBundle {
    ConstraintBundle {
        persona: PERSONA_BLOCK.to_string(),
        invariant_rules: INVARIANT_RULES.iter().map(|rule| (*rule).to_string()).collect(),
        calibration: calibration_for(classification.tier).to_string(),
        budget_instruction: format!(
            "Keep the response under {} words. Mode: {:?}.",
            classification.budget.max_words, classification.budget.mode
        ),
        resistance_instruction: resistance_instruction(&classification.resistance),
        landscape_instructions: landscape_instructions(landscape),
        regeneration_hints: regeneration_hints.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{assemble, LANDSCAPE_PROMPT_CAP};
    use crate::classify::{classify, Dimension, Tier};
    use crate::gate::Invariant;
    use crate::lexicon::NARRATION_PHRASES;
    use crate::pathways::{Pathway, PathwayLandscape};

    fn deep_classification() -> crate::classify::Classification {
        classify(
            "i never told anyone but growing up i watched it happen and it still haunts me",
            &[],
        )
    }

    fn landscape_of(count: usize) -> PathwayLandscape {
        let now = Utc::now();
        let pathways = (0..count)
            .map(|index| {
                let mut pathway = Pathway::seed(
                    "u1",
                    Dimension::Psychology,
                    &format!("self_worth_{index}"),
                    Tier::Identity,
                    now,
                );
                pathway.conductance = 0.9 - index as f64 * 0.05;
                pathway
            })
            .collect();
        PathwayLandscape { pathways, total_sessions: 4 }
    }

    #[test]
    fn bundle_sections_appear_in_fixed_order() {
        let classification = deep_classification();
        let landscape = landscape_of(2);
        let bundle = assemble(&classification, Some(&landscape), Some("Stay present yourself."));
        let rendered = bundle.render();

        let persona_at = rendered.find("spoken-voice companion").expect("persona");
        let rules_at = rendered.find("Absolute rules:").expect("rules");
        let calibration_at = rendered.find("identity-level").expect("calibration");
        let budget_at = rendered.find("Keep the response under").expect("budget");
        let landscape_at = rendered.find("Quiet context").expect("landscape");
        let hints_at = rendered.find("previous attempt was rejected").expect("hints");

        assert!(persona_at < rules_at);
        assert!(rules_at < calibration_at);
        assert!(calibration_at < budget_at);
        assert!(budget_at < landscape_at);
        assert!(landscape_at < hints_at);
    }

    #[test]
    fn identical_inputs_produce_identical_bundles() {
        let classification = deep_classification();
        let landscape = landscape_of(3);
        let first = assemble(&classification, Some(&landscape), None);
        let second = assemble(&classification, Some(&landscape), None);
        assert_eq!(first, second);
        assert_eq!(first.render(), second.render());
    }

    #[test]
    fn landscape_block_is_capped_and_behavioral_only() {
        let classification = deep_classification();
        let landscape = landscape_of(9);
        let bundle = assemble(&classification, Some(&landscape), None);
        assert_eq!(bundle.landscape_instructions.len(), LANDSCAPE_PROMPT_CAP);

        // The injected lines instruct tone, never recall.
        for line in &bundle.landscape_instructions {
            let lowered = line.to_lowercase();
            for phrase in NARRATION_PHRASES {
                assert!(!lowered.contains(phrase), "landscape line narrates: {line}");
            }
            assert!(line.contains("extra gentleness"));
        }
    }

    #[test]
    fn optional_blocks_are_omitted_when_absent() {
        let classification = classify("I went to the store today", &[]);
        let bundle = assemble(&classification, None, None);
        assert!(bundle.resistance_instruction.is_none());
        assert!(bundle.landscape_instructions.is_empty());
        assert!(bundle.regeneration_hints.is_none());

        let rendered = bundle.render();
        assert!(!rendered.contains("Quiet context"));
        assert!(!rendered.contains("previous attempt"));
    }

    #[test]
    fn strongest_resistance_signal_drives_the_instruction() {
        let classification = classify(
            "it's fine, i don't want to talk about it, let's talk about something else",
            &[],
        );
        let bundle = assemble(&classification, None, None);
        let instruction = bundle.resistance_instruction.expect("resistance present");
        assert!(instruction.contains("Critical"));
        assert!(instruction.contains("honor the boundary"));
    }

    #[test]
    fn one_rule_per_invariant_is_stated_upstream() {
        let classification = classify("hey", &[]);
        let bundle = assemble(&classification, None, None);
        assert_eq!(bundle.invariant_rules.len(), Invariant::PRIORITY.len());
    }
}
