use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use attune_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};

use super::RepositoryError;
use crate::DbPool;

/// Durable audit trail. Unlike the in-process sink this is explicit and
/// async; callers that must not block a turn write through a spawned task.
pub struct SqlAuditStore {
    pool: DbPool,
}

impl SqlAuditStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|err| RepositoryError::Decode(format!("metadata encode failed: {err}")))?;

        sqlx::query(
            r#"
            INSERT INTO audit_event (
                event_id, name, category, outcome, conversation_id, user_id,
                correlation_id, actor, metadata_json, occurred_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.event_id.to_string())
        .bind(&event.name)
        .bind(event.category.as_str())
        .bind(event.outcome.as_str())
        .bind(&event.context.conversation_id)
        .bind(&event.context.user_id)
        .bind(&event.context.correlation_id)
        .bind(&event.context.actor)
        .bind(metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id, name, category, outcome, conversation_id, user_id,
                correlation_id, actor, metadata_json, occurred_at
            FROM audit_event
            WHERE correlation_id = ?
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(correlation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }
}

fn event_from_row(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id_raw = row.get::<String, _>("event_id");
    let event_id = Uuid::parse_str(&event_id_raw)
        .map_err(|err| RepositoryError::Decode(format!("invalid event id `{event_id_raw}`: {err}")))?;

    let category_raw = row.get::<String, _>("category");
    let category = AuditCategory::parse(&category_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown audit category `{category_raw}`")))?;

    let outcome_raw = row.get::<String, _>("outcome");
    let outcome = AuditOutcome::parse(&outcome_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown audit outcome `{outcome_raw}`")))?;

    let metadata_raw = row.get::<String, _>("metadata_json");
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|err| RepositoryError::Decode(format!("metadata decode failed: {err}")))?;

    let occurred_raw = row.get::<String, _>("occurred_at");
    let occurred_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&occurred_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| {
            RepositoryError::Decode(format!("invalid occurred_at `{occurred_raw}`: {err}"))
        })?;

    Ok(AuditEvent {
        event_id,
        name: row.get::<String, _>("name"),
        category,
        outcome,
        context: AuditContext {
            conversation_id: row.get::<String, _>("conversation_id"),
            user_id: row.get::<String, _>("user_id"),
            correlation_id: row.get::<String, _>("correlation_id"),
            actor: row.get::<String, _>("actor"),
        },
        metadata,
        occurred_at,
    })
}
