//! Pathway accumulation at the edge of the turn pipeline.
//!
//! Every operation here degrades instead of failing: a persistence error is
//! logged and the turn proceeds as if the pathway store were empty. The
//! response path never blocks on this module.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use attune_core::classify::Classification;
use attune_core::pathways::{Pathway, PathwayLandscape, REINFORCEMENT_TIER};
use attune_db::repositories::PathwayRepository;

/// Upper bound on rows pulled for one landscape; filtering and capping to
/// the prompt-facing size happens in [`PathwayLandscape::from_pathways`].
const LANDSCAPE_FETCH_LIMIT: u32 = 64;

/// Attempts per reinforcement before giving the turn up as contended.
/// Every failed guarded write means another writer committed, so the loop
/// cannot spin without global progress.
const REINFORCE_RETRY_LIMIT: u32 = 8;

pub struct PathwayAccumulator<R> {
    repository: Arc<R>,
}

impl<R: PathwayRepository> PathwayAccumulator<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Reinforces (or seeds) the pathway for the utterance's top theme.
    /// Returns the stored pathway, or `None` when the turn carries nothing
    /// worth remembering or persistence failed.
    pub async fn reinforce(
        &self,
        user_id: &str,
        classification: &Classification,
        now: DateTime<Utc>,
    ) -> Option<Pathway> {
        if classification.tier < REINFORCEMENT_TIER {
            return None;
        }
        let (dimension, theme) = classification.top_theme()?;

        for _ in 0..REINFORCE_RETRY_LIMIT {
            let existing = match self.repository.get(user_id, dimension, theme).await {
                Ok(existing) => existing,
                Err(error) => {
                    warn!(
                        event_name = "pathway.load_failed",
                        user_id,
                        theme,
                        error = %error,
                        "skipping reinforcement after load failure"
                    );
                    return None;
                }
            };

            let (pathway, expected_count) = match existing {
                Some(mut pathway) => {
                    let expected_count = Some(pathway.reinforcement_count);
                    pathway.reinforce(classification, now);
                    (pathway, expected_count)
                }
                None => (Pathway::seed(user_id, dimension, theme, classification.tier, now), None),
            };

            match self.repository.compare_and_upsert(pathway.clone(), expected_count).await {
                Ok(true) => return Some(pathway),
                // Another writer landed first; reload and fold into its result.
                Ok(false) => continue,
                Err(error) => {
                    warn!(
                        event_name = "pathway.store_failed",
                        user_id,
                        theme,
                        error = %error,
                        "reinforcement lost for this turn"
                    );
                    return None;
                }
            }
        }

        warn!(
            event_name = "pathway.store_contended",
            user_id,
            theme,
            "reinforcement dropped after repeated write contention"
        );
        None
    }

    /// Loads the user's landscape, pruning faded stale pathways on the way.
    /// Degrades to an empty landscape on any persistence failure.
    pub async fn load_landscape(&self, user_id: &str, now: DateTime<Utc>) -> PathwayLandscape {
        let pathways =
            match self.repository.list_by_user(user_id, 0.0, LANDSCAPE_FETCH_LIMIT).await {
                Ok(pathways) => pathways,
                Err(error) => {
                    warn!(
                        event_name = "pathway.list_failed",
                        user_id,
                        error = %error,
                        "degrading to an empty landscape"
                    );
                    return PathwayLandscape::empty();
                }
            };

        // The prune predicate runs over the decayed conductance; the stored
        // column is frozen at the last reinforcement and says nothing about
        // how faded a pathway is today.
        let (prunable, live): (Vec<_>, Vec<_>) =
            pathways.into_iter().partition(|pathway| pathway.is_prunable(now));
        for pathway in prunable {
            if let Err(error) =
                self.repository.delete(user_id, pathway.dimension, &pathway.theme).await
            {
                warn!(
                    event_name = "pathway.prune_failed",
                    user_id,
                    theme = %pathway.theme,
                    error = %error,
                    "faded pathway left in place"
                );
            }
        }

        let total_sessions = match self.repository.count_sessions(user_id).await {
            Ok(count) => count,
            Err(error) => {
                warn!(
                    event_name = "pathway.session_count_failed",
                    user_id,
                    error = %error,
                    "reporting zero sessions"
                );
                0
            }
        };

        PathwayLandscape::from_pathways(live, now, total_sessions)
    }

    pub async fn record_session(&self, user_id: &str, started_at: DateTime<Utc>) {
        if let Err(error) = self.repository.record_session(user_id, started_at).await {
            warn!(
                event_name = "pathway.session_record_failed",
                user_id,
                error = %error,
                "session not counted"
            );
        }
    }
}
