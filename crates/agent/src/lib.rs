//! Turn runtime - conversational policy orchestration
//!
//! This crate drives one conversation turn end to end:
//! - Classifies the utterance into a bounded control signal (`attune-core`)
//! - Loads the pathway landscape and assembles the constraint bundle
//! - Generates through a pluggable [`llm::LlmClient`]
//! - Gates the response and drives the bounded regeneration loop
//! - Reinforces pathways off the response path
//!
//! # Safety Principle
//!
//! The LLM is strictly a renderer. It NEVER decides tiers, budgets, or gate
//! verdicts. Those are deterministic decisions made by the policy core.

pub mod accumulator;
pub mod bootstrap;
pub mod llm;
pub mod runtime;

pub use accumulator::PathwayAccumulator;
pub use bootstrap::{bootstrap, init_tracing, Application, BootstrapError};
pub use llm::LlmClient;
pub use runtime::{ConversationContext, Delivery, TurnOutcome, TurnRuntime};
