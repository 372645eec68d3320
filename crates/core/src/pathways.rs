//! Pathway reinforcement: slow-moving conductance per (user, dimension,
//! theme) pair.
//!
//! Decay is a read-time contract. The stored conductance is the value as of
//! `last_reinforced_at`; reads compute the effective value on the fly and
//! never write it back, so repeated reads are idempotent. Reinforcement is
//! the only operation that folds decay into storage and advances the clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{Classification, Dimension, Tier};

pub const MAX_CONDUCTANCE: f64 = 1.0;
pub const BASE_GROWTH_RATE: f64 = 0.15;
pub const DECAY_RATE: f64 = 0.02;
pub const PRUNE_FLOOR: f64 = 0.05;
pub const STALE_AGE_DAYS: i64 = 45;
pub const VISIBILITY_FLOOR: f64 = 0.1;
pub const LANDSCAPE_CAP: usize = 5;
/// Minimum tier that reinforces a pathway at all.
pub const REINFORCEMENT_TIER: Tier = Tier::Personal;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub user_id: String,
    pub dimension: Dimension,
    pub theme: String,
    /// Conductance as of `last_reinforced_at`; decay applies at read time.
    pub conductance: f64,
    pub reinforcement_count: u32,
    pub max_tier_seen: Tier,
    pub last_reinforced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Pathway {
    pub fn seed(
        user_id: &str,
        dimension: Dimension,
        theme: &str,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            dimension,
            theme: theme.to_string(),
            conductance: seed_conductance(tier),
            reinforcement_count: 1,
            max_tier_seen: tier,
            last_reinforced_at: now,
            created_at: now,
        }
    }

    pub fn effective_conductance(&self, now: DateTime<Utc>) -> f64 {
        decayed_conductance(self.conductance, self.last_reinforced_at, now)
    }

    /// Prunable only when faded below the floor AND old enough; recent
    /// pathways survive even when weak.
    pub fn is_prunable(&self, now: DateTime<Utc>) -> bool {
        self.effective_conductance(now) < PRUNE_FLOOR
            && now - self.created_at > Duration::days(STALE_AGE_DAYS)
    }

    pub fn reinforce(&mut self, classification: &Classification, now: DateTime<Utc>) {
        let current = self.effective_conductance(now);
        let grown = (current + reinforcement_increment(current, classification))
            .min(MAX_CONDUCTANCE);
        self.conductance = grown;
        self.reinforcement_count = self.reinforcement_count.saturating_add(1);
        self.max_tier_seen = self.max_tier_seen.max(classification.tier);
        self.last_reinforced_at = now;
    }
}

fn seed_conductance(tier: Tier) -> f64 {
    match tier {
        Tier::Identity => 0.30,
        Tier::Relational => 0.22,
        Tier::Body => 0.15,
        _ => 0.10,
    }
}

fn tier_multiplier(tier: Tier) -> f64 {
    match tier {
        Tier::Identity => 2.0,
        Tier::Relational => 1.4,
        Tier::Body => 1.0,
        _ => 0.6,
    }
}

fn depth_multiplier(classification: &Classification) -> f64 {
    if classification.depth.is_covenant {
        1.3
    } else if classification.depth.is_deep {
        1.15
    } else {
        1.0
    }
}

/// Asymptotic growth: the increment shrinks as conductance approaches the
/// ceiling, so no single run of turns can saturate a pathway.
pub fn reinforcement_increment(current: f64, classification: &Classification) -> f64 {
    let headroom = (MAX_CONDUCTANCE - current).max(0.0);
    BASE_GROWTH_RATE
        * (headroom / MAX_CONDUCTANCE)
        * tier_multiplier(classification.tier)
        * depth_multiplier(classification)
}

pub fn decayed_conductance(
    stored: f64,
    last_reinforced_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let elapsed_days = (now - last_reinforced_at).num_seconds() as f64 / 86_400.0;
    // Same-day reads see the stored value untouched.
    if elapsed_days < 1.0 {
        return stored;
    }
    stored * (-DECAY_RATE * elapsed_days).exp()
}

/// The top pathways surfaced to the prompt assembler, already filtered,
/// ordered, and capped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathwayLandscape {
    pub pathways: Vec<Pathway>,
    pub total_sessions: u64,
}

impl PathwayLandscape {
    pub fn empty() -> Self {
        Self { pathways: Vec::new(), total_sessions: 0 }
    }

    pub fn from_pathways(
        mut pathways: Vec<Pathway>,
        now: DateTime<Utc>,
        total_sessions: u64,
    ) -> Self {
        pathways.retain(|pathway| pathway.effective_conductance(now) >= VISIBILITY_FLOOR);
        pathways.sort_by(|a, b| {
            b.effective_conductance(now)
                .partial_cmp(&a.effective_conductance(now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pathways.truncate(LANDSCAPE_CAP);
        Self { pathways, total_sessions }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{
        decayed_conductance, reinforcement_increment, Pathway, PathwayLandscape, DECAY_RATE,
        LANDSCAPE_CAP, MAX_CONDUCTANCE, PRUNE_FLOOR,
    };
    use crate::classify::{classify, Dimension, Tier};

    fn identity_classification() -> crate::classify::Classification {
        classify("lately i feel worthless no matter what i do", &[])
    }

    #[test]
    fn seed_conductance_scales_with_tier() {
        let now = Utc::now();
        let identity = Pathway::seed("u1", Dimension::Psychology, "self_worth", Tier::Identity, now);
        let body = Pathway::seed("u1", Dimension::Physiology, "sleep", Tier::Body, now);
        assert!(identity.conductance > body.conductance);
        assert_eq!(identity.reinforcement_count, 1);
    }

    #[test]
    fn repeated_reinforcement_saturates_below_the_ceiling() {
        let now = Utc::now();
        let classification = identity_classification();
        let mut pathway =
            Pathway::seed("u1", Dimension::Psychology, "self_worth", Tier::Identity, now);

        let mut last_increment = f64::INFINITY;
        for turn in 0..200 {
            let at = now + Duration::days(turn);
            let before = pathway.effective_conductance(at);
            let increment = reinforcement_increment(before, &classification);
            assert!(
                increment <= last_increment + 1e-9,
                "increment must not grow as conductance rises"
            );
            last_increment = increment;
            pathway.reinforce(&classification, at);
            assert!(pathway.conductance <= MAX_CONDUCTANCE);
        }
        assert!(pathway.conductance > 0.9);
    }

    #[test]
    fn decay_is_skipped_within_the_first_day() {
        let now = Utc::now();
        let later = now + Duration::hours(23);
        assert_eq!(decayed_conductance(0.8, now, later), 0.8);
    }

    #[test]
    fn decay_follows_the_exponential_schedule() {
        let now = Utc::now();
        let later = now + Duration::days(10);
        let expected = 0.8 * (-DECAY_RATE * 10.0).exp();
        assert!((decayed_conductance(0.8, now, later) - expected).abs() < 1e-9);
    }

    #[test]
    fn reads_never_mutate_stored_conductance() {
        let now = Utc::now();
        let pathway = Pathway::seed("u1", Dimension::Sociology, "family", Tier::Relational, now);
        let later = now + Duration::days(30);
        let first = pathway.effective_conductance(later);
        let second = pathway.effective_conductance(later);
        assert_eq!(first, second);
        assert_eq!(pathway.conductance, 0.22);
    }

    #[test]
    fn reinforcement_folds_decay_into_storage_and_advances_the_clock() {
        let now = Utc::now();
        let classification = identity_classification();
        let mut pathway =
            Pathway::seed("u1", Dimension::Psychology, "self_worth", Tier::Identity, now);
        let later = now + Duration::days(20);
        let decayed = pathway.effective_conductance(later);
        assert!(decayed < pathway.conductance);

        pathway.reinforce(&classification, later);
        assert!(pathway.conductance > decayed);
        assert_eq!(pathway.last_reinforced_at, later);
        assert_eq!(pathway.reinforcement_count, 2);
    }

    #[test]
    fn pruning_requires_both_fade_and_age() {
        let now = Utc::now();
        let mut faded = Pathway::seed("u1", Dimension::Physiology, "pain", Tier::Body, now);
        faded.conductance = PRUNE_FLOOR / 2.0;

        // Faded but too young.
        assert!(!faded.is_prunable(now + Duration::days(10)));
        // Old enough and faded.
        assert!(faded.is_prunable(now + Duration::days(60)));

        // Old but still strong.
        let strong = Pathway::seed("u1", Dimension::Psychology, "purpose", Tier::Identity, now);
        assert!(!strong.is_prunable(now + Duration::days(60)));
    }

    #[test]
    fn max_tier_seen_only_ratchets_upward() {
        let now = Utc::now();
        let mut pathway = Pathway::seed("u1", Dimension::Sociology, "family", Tier::Identity, now);
        let low_tier = classify("my sister and i had a huge argument yesterday", &[]);
        assert_eq!(low_tier.tier, Tier::Relational);
        pathway.reinforce(&low_tier, now + Duration::days(1));
        assert_eq!(pathway.max_tier_seen, Tier::Identity);
    }

    #[test]
    fn landscape_filters_sorts_and_caps() {
        let now = Utc::now();
        let mut pathways = Vec::new();
        for (index, conductance) in [0.9, 0.05, 0.5, 0.3, 0.7, 0.2, 0.6].iter().enumerate() {
            let mut pathway = Pathway::seed(
                "u1",
                Dimension::Psychology,
                &format!("theme_{index}"),
                Tier::Identity,
                now,
            );
            pathway.conductance = *conductance;
            pathways.push(pathway);
        }

        let landscape = PathwayLandscape::from_pathways(pathways, now, 12);
        assert_eq!(landscape.pathways.len(), LANDSCAPE_CAP);
        assert_eq!(landscape.total_sessions, 12);
        for pair in landscape.pathways.windows(2) {
            assert!(pair[0].effective_conductance(now) >= pair[1].effective_conductance(now));
        }
        assert!(landscape
            .pathways
            .iter()
            .all(|pathway| pathway.effective_conductance(now) >= super::VISIBILITY_FLOOR));
    }
}
