//! In-process repository for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use attune_core::classify::Dimension;
use attune_core::pathways::Pathway;

use super::{PathwayRepository, RepositoryError};

type PathwayKey = (String, String, String);

#[derive(Default)]
pub struct InMemoryPathwayRepository {
    pathways: RwLock<HashMap<PathwayKey, Pathway>>,
    sessions: RwLock<Vec<(String, DateTime<Utc>)>>,
}

impl InMemoryPathwayRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user_id: &str, dimension: Dimension, theme: &str) -> PathwayKey {
        (user_id.to_string(), dimension.as_str().to_string(), theme.to_string())
    }
}

#[async_trait]
impl PathwayRepository for InMemoryPathwayRepository {
    async fn get(
        &self,
        user_id: &str,
        dimension: Dimension,
        theme: &str,
    ) -> Result<Option<Pathway>, RepositoryError> {
        let pathways = self.pathways.read().await;
        Ok(pathways.get(&Self::key(user_id, dimension, theme)).cloned())
    }

    async fn upsert(&self, pathway: Pathway) -> Result<(), RepositoryError> {
        let key = Self::key(&pathway.user_id, pathway.dimension, &pathway.theme);
        let mut pathways = self.pathways.write().await;
        pathways.insert(key, pathway);
        Ok(())
    }

    async fn compare_and_upsert(
        &self,
        pathway: Pathway,
        expected_count: Option<u32>,
    ) -> Result<bool, RepositoryError> {
        let key = Self::key(&pathway.user_id, pathway.dimension, &pathway.theme);
        // The write lock spans the check and the write; this is the
        // serialization point for racing reinforcements.
        let mut pathways = self.pathways.write().await;
        let guard_holds = match (pathways.get(&key), expected_count) {
            (None, None) => true,
            (Some(existing), Some(count)) => existing.reinforcement_count == count,
            _ => false,
        };
        if guard_holds {
            pathways.insert(key, pathway);
        }
        Ok(guard_holds)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        min_conductance: f64,
        limit: u32,
    ) -> Result<Vec<Pathway>, RepositoryError> {
        let pathways = self.pathways.read().await;
        let mut matched: Vec<Pathway> = pathways
            .values()
            .filter(|pathway| pathway.user_id == user_id && pathway.conductance >= min_conductance)
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.conductance.partial_cmp(&a.conductance).unwrap_or(std::cmp::Ordering::Equal)
        });
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn delete(
        &self,
        user_id: &str,
        dimension: Dimension,
        theme: &str,
    ) -> Result<bool, RepositoryError> {
        let mut pathways = self.pathways.write().await;
        Ok(pathways.remove(&Self::key(user_id, dimension, theme)).is_some())
    }

    async fn count_sessions(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.iter().filter(|(user, _)| user == user_id).count() as u64)
    }

    async fn record_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.push((user_id.to_string(), started_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use attune_core::classify::{Dimension, Tier};
    use attune_core::pathways::Pathway;

    use super::InMemoryPathwayRepository;
    use crate::repositories::PathwayRepository;

    #[tokio::test]
    async fn upsert_and_get_round_trip() {
        let repo = InMemoryPathwayRepository::new();
        let now = Utc::now();
        let pathway = Pathway::seed("u1", Dimension::Sociology, "family", Tier::Relational, now);

        repo.upsert(pathway.clone()).await.expect("upsert");
        let loaded = repo
            .get("u1", Dimension::Sociology, "family")
            .await
            .expect("get")
            .expect("pathway present");
        assert_eq!(loaded, pathway);
    }

    #[tokio::test]
    async fn list_orders_by_conductance_and_honors_limit() {
        let repo = InMemoryPathwayRepository::new();
        let now = Utc::now();
        for (theme, conductance) in [("a", 0.2), ("b", 0.8), ("c", 0.5)] {
            let mut pathway = Pathway::seed("u1", Dimension::Psychology, theme, Tier::Identity, now);
            pathway.conductance = conductance;
            repo.upsert(pathway).await.expect("upsert");
        }

        let listed = repo.list_by_user("u1", 0.0, 2).await.expect("list");
        let themes: Vec<_> = listed.iter().map(|p| p.theme.as_str()).collect();
        assert_eq!(themes, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn compare_and_upsert_rejects_stale_counts() {
        let repo = InMemoryPathwayRepository::new();
        let now = Utc::now();
        let seed = Pathway::seed("u1", Dimension::Physiology, "pain", Tier::Body, now);

        assert!(repo.compare_and_upsert(seed.clone(), None).await.expect("seed"));
        // A second seed for the same key lost the race.
        assert!(!repo.compare_and_upsert(seed.clone(), None).await.expect("reseed"));

        let mut grown = seed.clone();
        grown.reinforcement_count = 2;
        grown.conductance = 0.3;
        assert!(!repo.compare_and_upsert(grown.clone(), Some(7)).await.expect("stale count"));
        assert!(repo.compare_and_upsert(grown, Some(1)).await.expect("current count"));

        let stored = repo
            .get("u1", Dimension::Physiology, "pain")
            .await
            .expect("get")
            .expect("pathway present");
        assert_eq!(stored.reinforcement_count, 2);
    }

    #[tokio::test]
    async fn delete_removes_only_the_keyed_pathway() {
        let repo = InMemoryPathwayRepository::new();
        let now = Utc::now();
        let faded = Pathway::seed(
            "u1",
            Dimension::Physiology,
            "pain",
            Tier::Body,
            now - Duration::days(90),
        );
        repo.upsert(faded).await.expect("upsert");
        let strong = Pathway::seed("u1", Dimension::Psychology, "purpose", Tier::Identity, now);
        repo.upsert(strong).await.expect("upsert");

        assert!(repo.delete("u1", Dimension::Physiology, "pain").await.expect("delete"));
        assert!(!repo.delete("u1", Dimension::Physiology, "pain").await.expect("redelete"));
        assert!(repo.get("u1", Dimension::Physiology, "pain").await.expect("get").is_none());
        assert!(repo.get("u1", Dimension::Psychology, "purpose").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn sessions_are_counted_per_user() {
        let repo = InMemoryPathwayRepository::new();
        let now = Utc::now();
        repo.record_session("u1", now).await.expect("record");
        repo.record_session("u2", now).await.expect("record");
        repo.record_session("u1", now).await.expect("record");

        assert_eq!(repo.count_sessions("u1").await.expect("count"), 2);
        assert_eq!(repo.count_sessions("u2").await.expect("count"), 1);
    }
}
