//! Turn latency checkpoints against the responsiveness budget.
//!
//! Targets are advisory; missing one is reported, never acted on. All marks
//! are first-write-wins so double instrumentation cannot shift a reading.

use std::time::Instant;

pub const CHECKPOINT_A_TARGET_MS: u64 = 300;
pub const CHECKPOINT_B_TARGET_MS: u64 = 700;
pub const CHECKPOINT_C_TARGET_MS: u64 = 1_200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    /// Classification complete.
    A,
    /// Prompt assembled, generation dispatched.
    B,
    /// Gated response ready for delivery.
    C,
}

/// Per-checkpoint targets. Defaults are the stock budget; deployments
/// override them through the `[timing]` config section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointTargets {
    pub checkpoint_a_ms: u64,
    pub checkpoint_b_ms: u64,
    pub checkpoint_c_ms: u64,
}

impl Default for CheckpointTargets {
    fn default() -> Self {
        Self {
            checkpoint_a_ms: CHECKPOINT_A_TARGET_MS,
            checkpoint_b_ms: CHECKPOINT_B_TARGET_MS,
            checkpoint_c_ms: CHECKPOINT_C_TARGET_MS,
        }
    }
}

impl CheckpointTargets {
    pub fn target_ms(&self, checkpoint: Checkpoint) -> u64 {
        match checkpoint {
            Checkpoint::A => self.checkpoint_a_ms,
            Checkpoint::B => self.checkpoint_b_ms,
            Checkpoint::C => self.checkpoint_c_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointTiming {
    pub checkpoint: Checkpoint,
    pub elapsed_ms: Option<u64>,
    pub target_ms: u64,
    pub met: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingReport {
    pub checkpoint_a: CheckpointTiming,
    pub checkpoint_b: CheckpointTiming,
    pub checkpoint_c: CheckpointTiming,
}

impl TimingReport {
    pub fn all_met(&self) -> bool {
        [self.checkpoint_a, self.checkpoint_b, self.checkpoint_c]
            .iter()
            .all(|timing| timing.met == Some(true))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TurnTimer {
    targets: CheckpointTargets,
    utterance_end: Option<Instant>,
    checkpoint_a: Option<Instant>,
    checkpoint_b: Option<Instant>,
    checkpoint_c: Option<Instant>,
}

impl TurnTimer {
    pub fn with_targets(targets: CheckpointTargets) -> Self {
        Self { targets, ..Self::default() }
    }

    pub fn mark_utterance_end(&mut self) {
        self.utterance_end.get_or_insert_with(Instant::now);
    }

    pub fn mark_checkpoint_a(&mut self) {
        self.checkpoint_a.get_or_insert_with(Instant::now);
    }

    pub fn mark_checkpoint_b(&mut self) {
        self.checkpoint_b.get_or_insert_with(Instant::now);
    }

    pub fn mark_checkpoint_c(&mut self) {
        self.checkpoint_c.get_or_insert_with(Instant::now);
    }

    /// No report exists before the utterance-end origin is marked.
    pub fn report(&self) -> Option<TimingReport> {
        let origin = self.utterance_end?;
        Some(TimingReport {
            checkpoint_a: timing(Checkpoint::A, &self.targets, origin, self.checkpoint_a),
            checkpoint_b: timing(Checkpoint::B, &self.targets, origin, self.checkpoint_b),
            checkpoint_c: timing(Checkpoint::C, &self.targets, origin, self.checkpoint_c),
        })
    }
}

fn timing(
    checkpoint: Checkpoint,
    targets: &CheckpointTargets,
    origin: Instant,
    marked: Option<Instant>,
) -> CheckpointTiming {
    let target_ms = targets.target_ms(checkpoint);
    let elapsed_ms =
        marked.map(|instant| instant.saturating_duration_since(origin).as_millis() as u64);
    CheckpointTiming {
        checkpoint,
        elapsed_ms,
        target_ms,
        met: elapsed_ms.map(|elapsed| elapsed <= target_ms),
    }
}
