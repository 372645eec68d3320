use thiserror::Error;

use crate::regen::RegenTransitionError;

/// Failures raised inside the policy core. Classification and gating never
/// fail; the one domain fault is a broken regeneration transition.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    RegenTransition(#[from] RegenTransitionError),
}

/// Turn-level failures surfaced to callers of the runtime. Persistence
/// errors never appear here; the accumulator degrades them locally.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("generation failure: {0}")]
    Generation(String),
}

impl From<RegenTransitionError> for ApplicationError {
    fn from(value: RegenTransitionError) -> Self {
        Self::Domain(DomainError::from(value))
    }
}
