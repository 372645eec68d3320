use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use attune_core::classify::{Dimension, Tier};
use attune_core::pathways::Pathway;

use super::{PathwayRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPathwayRepository {
    pool: DbPool,
}

impl SqlPathwayRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("invalid {column} timestamp `{raw}`: {err}")))
}

fn pathway_from_row(row: &SqliteRow) -> Result<Pathway, RepositoryError> {
    let dimension_raw = row.get::<String, _>("dimension");
    let dimension = Dimension::parse(&dimension_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown dimension `{dimension_raw}`")))?;

    let weight = row.get::<i64, _>("max_tier_weight");
    let weight = u8::try_from(weight)
        .map_err(|_| RepositoryError::Decode(format!("tier weight {weight} out of range")))?;

    let last_reinforced_raw = row.get::<String, _>("last_reinforced_at");
    let created_raw = row.get::<String, _>("created_at");

    Ok(Pathway {
        user_id: row.get::<String, _>("user_id"),
        dimension,
        theme: row.get::<String, _>("theme"),
        conductance: row.get::<f64, _>("conductance"),
        reinforcement_count: row.get::<i64, _>("reinforcement_count") as u32,
        max_tier_seen: Tier::from_weight(weight),
        last_reinforced_at: parse_timestamp(&last_reinforced_raw, "last_reinforced_at")?,
        created_at: parse_timestamp(&created_raw, "created_at")?,
    })
}

#[async_trait]
impl PathwayRepository for SqlPathwayRepository {
    async fn get(
        &self,
        user_id: &str,
        dimension: Dimension,
        theme: &str,
    ) -> Result<Option<Pathway>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                user_id, dimension, theme, conductance, reinforcement_count,
                max_tier_weight, last_reinforced_at, created_at
            FROM pathway
            WHERE user_id = ? AND dimension = ? AND theme = ?
            "#,
        )
        .bind(user_id)
        .bind(dimension.as_str())
        .bind(theme)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(pathway_from_row).transpose()
    }

    async fn upsert(&self, pathway: Pathway) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO pathway (
                user_id, dimension, theme, conductance, reinforcement_count,
                max_tier_weight, last_reinforced_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, dimension, theme) DO UPDATE SET
                conductance = excluded.conductance,
                reinforcement_count = excluded.reinforcement_count,
                max_tier_weight = excluded.max_tier_weight,
                last_reinforced_at = excluded.last_reinforced_at
            "#,
        )
        .bind(&pathway.user_id)
        .bind(pathway.dimension.as_str())
        .bind(&pathway.theme)
        .bind(pathway.conductance)
        .bind(pathway.reinforcement_count as i64)
        .bind(pathway.max_tier_seen.weight() as i64)
        .bind(pathway.last_reinforced_at.to_rfc3339())
        .bind(pathway.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn compare_and_upsert(
        &self,
        pathway: Pathway,
        expected_count: Option<u32>,
    ) -> Result<bool, RepositoryError> {
        let result = match expected_count {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO pathway (
                        user_id, dimension, theme, conductance, reinforcement_count,
                        max_tier_weight, last_reinforced_at, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT (user_id, dimension, theme) DO NOTHING
                    "#,
                )
                .bind(&pathway.user_id)
                .bind(pathway.dimension.as_str())
                .bind(&pathway.theme)
                .bind(pathway.conductance)
                .bind(pathway.reinforcement_count as i64)
                .bind(pathway.max_tier_seen.weight() as i64)
                .bind(pathway.last_reinforced_at.to_rfc3339())
                .bind(pathway.created_at.to_rfc3339())
                .execute(&self.pool)
                .await?
            }
            Some(count) => {
                sqlx::query(
                    r#"
                    UPDATE pathway SET
                        conductance = ?,
                        reinforcement_count = ?,
                        max_tier_weight = ?,
                        last_reinforced_at = ?
                    WHERE user_id = ? AND dimension = ? AND theme = ?
                        AND reinforcement_count = ?
                    "#,
                )
                .bind(pathway.conductance)
                .bind(pathway.reinforcement_count as i64)
                .bind(pathway.max_tier_seen.weight() as i64)
                .bind(pathway.last_reinforced_at.to_rfc3339())
                .bind(&pathway.user_id)
                .bind(pathway.dimension.as_str())
                .bind(&pathway.theme)
                .bind(count as i64)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        min_conductance: f64,
        limit: u32,
    ) -> Result<Vec<Pathway>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                user_id, dimension, theme, conductance, reinforcement_count,
                max_tier_weight, last_reinforced_at, created_at
            FROM pathway
            WHERE user_id = ? AND conductance >= ?
            ORDER BY conductance DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(min_conductance)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(pathway_from_row).collect()
    }

    async fn delete(
        &self,
        user_id: &str,
        dimension: Dimension,
        theme: &str,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM pathway WHERE user_id = ? AND dimension = ? AND theme = ?")
                .bind(user_id)
                .bind(dimension.as_str())
                .bind(theme)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_sessions(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM conversation_session WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count") as u64)
    }

    async fn record_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO conversation_session (user_id, started_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(started_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use attune_core::classify::{Dimension, Tier};
    use attune_core::config::DatabaseConfig;
    use attune_core::pathways::Pathway;

    use super::SqlPathwayRepository;
    use crate::connect;
    use crate::migrations::run_pending;
    use crate::repositories::PathwayRepository;

    async fn repository() -> SqlPathwayRepository {
        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        let pool = connect(&database).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        SqlPathwayRepository::new(pool)
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips_all_fields() {
        let repo = repository().await;
        let now = Utc::now();
        let pathway = Pathway::seed("u1", Dimension::Psychology, "self_worth", Tier::Identity, now);

        repo.upsert(pathway.clone()).await.expect("upsert");
        let loaded = repo
            .get("u1", Dimension::Psychology, "self_worth")
            .await
            .expect("get")
            .expect("pathway present");

        assert_eq!(loaded.theme, "self_worth");
        assert_eq!(loaded.dimension, Dimension::Psychology);
        assert_eq!(loaded.max_tier_seen, Tier::Identity);
        assert_eq!(loaded.reinforcement_count, 1);
        assert!((loaded.conductance - pathway.conductance).abs() < 1e-12);
        // RFC 3339 round-trip keeps sub-second precision.
        assert_eq!(loaded.last_reinforced_at, pathway.last_reinforced_at);
    }

    #[tokio::test]
    async fn upsert_replaces_by_theme_key_instead_of_duplicating() {
        let repo = repository().await;
        let now = Utc::now();
        let mut pathway = Pathway::seed("u1", Dimension::Sociology, "family", Tier::Relational, now);

        repo.upsert(pathway.clone()).await.expect("first upsert");
        pathway.conductance = 0.5;
        pathway.reinforcement_count = 2;
        repo.upsert(pathway).await.expect("second upsert");

        let listed = repo.list_by_user("u1", 0.0, 10).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert!((listed[0].conductance - 0.5).abs() < 1e-12);
        assert_eq!(listed[0].reinforcement_count, 2);
    }

    #[tokio::test]
    async fn list_filters_by_floor_and_orders_descending() {
        let repo = repository().await;
        let now = Utc::now();
        for (theme, conductance) in [("a", 0.9), ("b", 0.05), ("c", 0.4)] {
            let mut pathway = Pathway::seed("u1", Dimension::Psychology, theme, Tier::Identity, now);
            pathway.conductance = conductance;
            repo.upsert(pathway).await.expect("upsert");
        }

        let listed = repo.list_by_user("u1", 0.1, 10).await.expect("list");
        let themes: Vec<_> = listed.iter().map(|p| p.theme.as_str()).collect();
        assert_eq!(themes, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn compare_and_upsert_guards_against_racing_writers() {
        let repo = repository().await;
        let now = Utc::now();
        let seed = Pathway::seed("u1", Dimension::Physiology, "pain", Tier::Body, now);

        assert!(repo.compare_and_upsert(seed.clone(), None).await.expect("seed"));
        // The row already exists; a second unconditioned insert is refused.
        assert!(!repo.compare_and_upsert(seed.clone(), None).await.expect("reseed"));

        let mut grown = seed.clone();
        grown.reinforcement_count = 2;
        grown.conductance = 0.3;
        assert!(!repo.compare_and_upsert(grown.clone(), Some(9)).await.expect("stale count"));
        assert!(repo.compare_and_upsert(grown, Some(1)).await.expect("current count"));

        let stored = repo
            .get("u1", Dimension::Physiology, "pain")
            .await
            .expect("get")
            .expect("pathway present");
        assert_eq!(stored.reinforcement_count, 2);
        assert!((stored.conductance - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn delete_removes_only_the_keyed_row() {
        let repo = repository().await;
        let now = Utc::now();

        let faded =
            Pathway::seed("u1", Dimension::Physiology, "pain", Tier::Body, now - Duration::days(90));
        repo.upsert(faded).await.expect("upsert faded");
        let strong = Pathway::seed("u1", Dimension::Psychology, "purpose", Tier::Identity, now);
        repo.upsert(strong).await.expect("upsert strong");

        assert!(repo.delete("u1", Dimension::Physiology, "pain").await.expect("delete"));
        assert!(!repo.delete("u1", Dimension::Physiology, "pain").await.expect("redelete"));

        let remaining = repo.list_by_user("u1", 0.0, 10).await.expect("list");
        let themes: Vec<_> = remaining.iter().map(|p| p.theme.as_str()).collect();
        assert_eq!(themes, vec!["purpose"]);
    }

    #[tokio::test]
    async fn session_count_tracks_recorded_sessions_per_user() {
        let repo = repository().await;
        let now = Utc::now();

        assert_eq!(repo.count_sessions("u1").await.expect("count"), 0);
        repo.record_session("u1", now).await.expect("record");
        repo.record_session("u1", now).await.expect("record");
        repo.record_session("u2", now).await.expect("record");

        assert_eq!(repo.count_sessions("u1").await.expect("count"), 2);
        assert_eq!(repo.count_sessions("u2").await.expect("count"), 1);
    }
}
