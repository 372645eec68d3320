pub mod audit;
pub mod classify;
pub mod config;
pub mod errors;
pub mod gate;
pub mod lexicon;
pub mod pathways;
pub mod prompt;
pub mod regen;
pub mod timing;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use classify::{
    classify, Classification, Dimension, Message, Mood, MoodSignal, ResistanceKind,
    ResistanceSeverity, ResistanceSignal, ResponseBudget, ResponseMode, Role, Tier,
};
pub use errors::{ApplicationError, DomainError};
pub use gate::{evaluate, GateResult, Invariant, Violation, ViolationSeverity};
pub use pathways::{Pathway, PathwayLandscape};
pub use prompt::{assemble, ConstraintBundle};
pub use regen::{advance, RegenContext, RegenEvent, RegenState, RegenTransition, MAX_REGENERATIONS};
pub use timing::{Checkpoint, CheckpointTargets, CheckpointTiming, TimingReport, TurnTimer};
