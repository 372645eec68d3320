use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use attune_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use attune_core::classify::{classify, Classification, Message};
use attune_core::errors::ApplicationError;
use attune_core::gate::{self, GateResult};
use attune_core::pathways::PathwayLandscape;
use attune_core::prompt;
use attune_core::regen::{advance, RegenContext, RegenEvent, RegenState, RegenTransitionError};
use attune_core::timing::{CheckpointTargets, TimingReport, TurnTimer};
use attune_db::repositories::PathwayRepository;

use crate::accumulator::PathwayAccumulator;
use crate::llm::LlmClient;

#[derive(Clone, Debug)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub user_id: String,
    pub history: Vec<Message>,
    pub turn_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The retry budget ran out; the response ships with its residual
    /// violations recorded rather than being withheld.
    DeliveredWithWarnings,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub response_text: String,
    pub classification: Classification,
    pub gate_result: GateResult,
    pub delivery: Delivery,
    pub attempts: u32,
    pub timing: Option<TimingReport>,
    /// Handle for the fire-and-forget reinforcement write; tests await it,
    /// production callers may drop it.
    pub reinforcement: Option<JoinHandle<()>>,
}

pub struct TurnRuntime<R> {
    llm: Arc<dyn LlmClient>,
    accumulator: Arc<PathwayAccumulator<R>>,
    audit: Arc<dyn AuditSink>,
    max_regenerations: u32,
    noise_bypass_enabled: bool,
    checkpoint_targets: CheckpointTargets,
}

impl<R: PathwayRepository + 'static> TurnRuntime<R> {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        accumulator: Arc<PathwayAccumulator<R>>,
        audit: Arc<dyn AuditSink>,
        max_regenerations: u32,
        noise_bypass_enabled: bool,
        checkpoint_targets: CheckpointTargets,
    ) -> Self {
        Self { llm, accumulator, audit, max_regenerations, noise_bypass_enabled, checkpoint_targets }
    }

    pub async fn process_turn(
        &self,
        context: &ConversationContext,
        utterance: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let audit_context = AuditContext {
            conversation_id: context.conversation_id.clone(),
            user_id: context.user_id.clone(),
            correlation_id: correlation_id.clone(),
            actor: "turn_runtime".to_string(),
        };

        let mut timer = TurnTimer::with_targets(self.checkpoint_targets);
        timer.mark_utterance_end();

        let classification = classify(utterance, &context.history);
        timer.mark_checkpoint_a();

        debug!(
            event_name = "turn.classified",
            correlation_id,
            tier = classification.tier.weight(),
            dimension = classification.primary_dimension.as_str(),
            "utterance classified"
        );
        self.audit.record(
            AuditEvent::new(
                "classification.completed",
                AuditCategory::Classification,
                AuditOutcome::Success,
                audit_context.clone(),
            )
            .with_metadata("tier", classification.tier.weight().to_string())
            .with_metadata("dimension", classification.primary_dimension.as_str()),
        );

        // Noise turns skip the landscape load and the retry budget; memory
        // has nothing to contribute to small talk.
        let bypass = self.noise_bypass_enabled && classification.budget.bypass_eligible;
        let landscape = if bypass {
            PathwayLandscape::empty()
        } else {
            self.accumulator.load_landscape(&context.user_id, Utc::now()).await
        };
        let landscape_ref = (!landscape.pathways.is_empty()).then_some(&landscape);

        let mut regen_context =
            RegenContext::new(if bypass { 0 } else { self.max_regenerations });
        let mut state = RegenState::Generating;
        let mut hints: Option<String> = None;
        let mut response_text;
        let gate_result;

        loop {
            let bundle = prompt::assemble(&classification, landscape_ref, hints.as_deref());
            let rendered = bundle.render();
            timer.mark_checkpoint_b();

            response_text = self
                .llm
                .complete(&rendered)
                .await
                .map_err(|error| ApplicationError::Generation(error.to_string()))?;
            state = advance(state, RegenEvent::GenerationCompleted, &mut regen_context)?.to;

            let evaluated = gate::evaluate(&response_text, &classification);
            let outcome =
                if evaluated.pass { AuditOutcome::Success } else { AuditOutcome::Rejected };
            self.audit.record(
                AuditEvent::new("gate.evaluated", AuditCategory::Gate, outcome, audit_context.clone())
                    .with_metadata("attempt", regen_context.attempts_used.to_string())
                    .with_metadata(
                        "violations",
                        evaluated
                            .violated_invariants()
                            .iter()
                            .map(|invariant| invariant.as_str())
                            .collect::<Vec<_>>()
                            .join(","),
                    ),
            );

            state = advance(
                state,
                RegenEvent::GateEvaluated {
                    pass: evaluated.pass,
                    requires_regeneration: evaluated.requires_regeneration,
                },
                &mut regen_context,
            )?
            .to;
            hints = evaluated.regeneration_hints.clone();

            match state {
                RegenState::Passed | RegenState::Exhausted => {
                    gate_result = evaluated;
                    break;
                }
                RegenState::RegenerateRequested => {
                    warn!(
                        event_name = "turn.regenerating",
                        correlation_id,
                        attempt = regen_context.attempts_used + 1,
                        "critical gate violation, regenerating"
                    );
                    state = advance(state, RegenEvent::RetryStarted, &mut regen_context)?.to;
                }
                other => {
                    return Err(RegenTransitionError::InvalidTransition {
                        state: other,
                        event: RegenEvent::GateEvaluated {
                            pass: evaluated.pass,
                            requires_regeneration: evaluated.requires_regeneration,
                        },
                    }
                    .into());
                }
            }
        }
        timer.mark_checkpoint_c();

        let delivery = match state {
            RegenState::Passed => Delivery::Delivered,
            _ => Delivery::DeliveredWithWarnings,
        };
        if delivery == Delivery::DeliveredWithWarnings {
            warn!(
                event_name = "turn.delivered_with_warnings",
                correlation_id,
                violations = gate_result.violations.len(),
                "retry budget exhausted, delivering best attempt"
            );
        }

        let reinforcement = (!classification.is_noise()).then(|| {
            let accumulator = Arc::clone(&self.accumulator);
            let user_id = context.user_id.clone();
            let classification = classification.clone();
            tokio::spawn(async move {
                accumulator.reinforce(&user_id, &classification, Utc::now()).await;
            })
        });

        info!(
            event_name = "turn.completed",
            correlation_id,
            delivery = ?delivery,
            attempts = regen_context.attempts_used,
            "turn delivered"
        );
        self.audit.record(
            AuditEvent::new(
                "turn.delivered",
                AuditCategory::System,
                AuditOutcome::Success,
                audit_context,
            )
            .with_metadata("attempts", regen_context.attempts_used.to_string())
            .with_metadata("with_warnings", (delivery == Delivery::DeliveredWithWarnings).to_string()),
        );

        Ok(TurnOutcome {
            response_text,
            classification,
            gate_result,
            delivery,
            attempts: regen_context.attempts_used,
            timing: timer.report(),
            reinforcement,
        })
    }
}
