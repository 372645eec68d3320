use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use attune_core::classify::Dimension;
use attune_core::pathways::Pathway;

pub mod audit;
pub mod memory;
pub mod pathway;

pub use audit::SqlAuditStore;
pub use memory::InMemoryPathwayRepository;
pub use pathway::SqlPathwayRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Persistence seam for the pathway accumulator. Stored conductance is the
/// value at `last_reinforced_at`; callers apply decay at read time.
#[async_trait]
pub trait PathwayRepository: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        dimension: Dimension,
        theme: &str,
    ) -> Result<Option<Pathway>, RepositoryError>;

    /// Insert or replace by the (user, dimension, theme) key,
    /// unconditionally.
    async fn upsert(&self, pathway: Pathway) -> Result<(), RepositoryError>;

    /// Guarded write for read-modify-write callers. `expected_count` is the
    /// reinforcement count the caller read (`None` for a fresh seed); the
    /// write lands only while the stored count still matches, so racing
    /// reinforcements cannot overwrite each other. Returns `false` when the
    /// guard failed and the caller should reload.
    async fn compare_and_upsert(
        &self,
        pathway: Pathway,
        expected_count: Option<u32>,
    ) -> Result<bool, RepositoryError>;

    async fn list_by_user(
        &self,
        user_id: &str,
        min_conductance: f64,
        limit: u32,
    ) -> Result<Vec<Pathway>, RepositoryError>;

    /// Removes one pathway by key. Returns `true` when a row existed.
    /// The prune decision itself lives with the caller, which sees the
    /// decayed conductance; the store only sees the frozen value.
    async fn delete(
        &self,
        user_id: &str,
        dimension: Dimension,
        theme: &str,
    ) -> Result<bool, RepositoryError>;

    async fn count_sessions(&self, user_id: &str) -> Result<u64, RepositoryError>;

    async fn record_session(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}
