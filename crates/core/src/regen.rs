//! Regeneration state machine for the gate retry loop.
//!
//! The gate itself is pure; the caller owns this machine and drives it with
//! an explicit bounded loop, never recursion. Exceeding the retry budget
//! always resolves to `Exhausted` (deliver with warnings), never to an
//! indefinite retry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_REGENERATIONS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegenState {
    Generating,
    Gating,
    Passed,
    RegenerateRequested,
    Exhausted,
}

impl RegenState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Exhausted)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegenEvent {
    GenerationCompleted,
    GateEvaluated { pass: bool, requires_regeneration: bool },
    RetryStarted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenContext {
    pub attempts_used: u32,
    pub max_regenerations: u32,
}

impl RegenContext {
    pub fn new(max_regenerations: u32) -> Self {
        Self { attempts_used: 0, max_regenerations }
    }

    pub fn budget_remains(&self) -> bool {
        self.attempts_used < self.max_regenerations
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenTransition {
    pub from: RegenState,
    pub to: RegenState,
    pub event: RegenEvent,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegenTransitionError {
    #[error("invalid regeneration transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RegenState, event: RegenEvent },
}

pub fn advance(
    current: RegenState,
    event: RegenEvent,
    context: &mut RegenContext,
) -> Result<RegenTransition, RegenTransitionError> {
    use RegenEvent::{GateEvaluated, GenerationCompleted, RetryStarted};
    use RegenState::{Exhausted, Gating, Generating, Passed, RegenerateRequested};

    let to = match (current, event) {
        (Generating, GenerationCompleted) => Gating,
        (Gating, GateEvaluated { pass: true, .. }) => Passed,
        (Gating, GateEvaluated { pass: false, requires_regeneration: true })
            if context.budget_remains() =>
        {
            RegenerateRequested
        }
        (Gating, GateEvaluated { pass: false, .. }) => Exhausted,
        (RegenerateRequested, RetryStarted) => {
            context.attempts_used += 1;
            Generating
        }
        (state, event) => return Err(RegenTransitionError::InvalidTransition { state, event }),
    };

    Ok(RegenTransition { from: current, to, event })
}

#[cfg(test)]
mod tests {
    use super::{
        advance, RegenContext, RegenEvent, RegenState, RegenTransitionError, MAX_REGENERATIONS,
    };

    fn gate_failed_critical() -> RegenEvent {
        RegenEvent::GateEvaluated { pass: false, requires_regeneration: true }
    }

    #[test]
    fn clean_pass_reaches_terminal_passed() {
        let mut context = RegenContext::new(MAX_REGENERATIONS);
        let gating = advance(RegenState::Generating, RegenEvent::GenerationCompleted, &mut context)
            .expect("generating -> gating");
        let passed = advance(
            gating.to,
            RegenEvent::GateEvaluated { pass: true, requires_regeneration: false },
            &mut context,
        )
        .expect("gating -> passed");
        assert_eq!(passed.to, RegenState::Passed);
        assert!(passed.to.is_terminal());
        assert_eq!(context.attempts_used, 0);
    }

    #[test]
    fn critical_failure_with_budget_requests_regeneration() {
        let mut context = RegenContext::new(MAX_REGENERATIONS);
        let outcome = advance(RegenState::Gating, gate_failed_critical(), &mut context)
            .expect("gating -> regenerate");
        assert_eq!(outcome.to, RegenState::RegenerateRequested);

        let retry = advance(outcome.to, RegenEvent::RetryStarted, &mut context)
            .expect("regenerate -> generating");
        assert_eq!(retry.to, RegenState::Generating);
        assert_eq!(context.attempts_used, 1);
    }

    #[test]
    fn non_critical_failure_resolves_to_exhausted_delivery() {
        let mut context = RegenContext::new(MAX_REGENERATIONS);
        let outcome = advance(
            RegenState::Gating,
            RegenEvent::GateEvaluated { pass: false, requires_regeneration: false },
            &mut context,
        )
        .expect("gating -> exhausted");
        assert_eq!(outcome.to, RegenState::Exhausted);
        assert!(outcome.to.is_terminal());
    }

    #[test]
    fn retry_budget_exhaustion_never_loops_indefinitely() {
        let mut context = RegenContext::new(MAX_REGENERATIONS);
        let mut state = RegenState::Generating;
        let mut transitions = 0;

        loop {
            state = advance(state, RegenEvent::GenerationCompleted, &mut context)
                .expect("generating -> gating")
                .to;
            state = advance(state, gate_failed_critical(), &mut context)
                .expect("gate evaluation transition")
                .to;
            transitions += 1;
            if state.is_terminal() {
                break;
            }
            state = advance(state, RegenEvent::RetryStarted, &mut context)
                .expect("regenerate -> generating")
                .to;
        }

        assert_eq!(state, RegenState::Exhausted);
        assert_eq!(context.attempts_used, MAX_REGENERATIONS);
        assert_eq!(transitions, (MAX_REGENERATIONS + 1) as usize);
    }

    #[test]
    fn terminal_states_reject_further_events() {
        let mut context = RegenContext::new(MAX_REGENERATIONS);
        for state in [RegenState::Passed, RegenState::Exhausted] {
            let error = advance(state, RegenEvent::GenerationCompleted, &mut context)
                .expect_err("terminal states accept no events");
            assert!(matches!(error, RegenTransitionError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let run = || {
            let mut context = RegenContext::new(MAX_REGENERATIONS);
            let mut state = RegenState::Generating;
            let events = [
                RegenEvent::GenerationCompleted,
                gate_failed_critical(),
                RegenEvent::RetryStarted,
                RegenEvent::GenerationCompleted,
                RegenEvent::GateEvaluated { pass: true, requires_regeneration: false },
            ];
            let mut path = Vec::new();
            for event in events {
                let transition = advance(state, event, &mut context).expect("deterministic run");
                path.push(transition.to);
                state = transition.to;
            }
            (path, context.attempts_used)
        };

        assert_eq!(run(), run());
    }
}
