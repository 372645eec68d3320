use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use attune_core::audit::AuditSink;
use attune_core::config::{AppConfig, ConfigError, LoadOptions, LogFormat, LoggingConfig};
use attune_core::timing::CheckpointTargets;
use attune_db::repositories::SqlPathwayRepository;
use attune_db::{connect, migrations, DbPool, SqlAuditStore};

use crate::accumulator::PathwayAccumulator;
use crate::llm::LlmClient;
use crate::runtime::TurnRuntime;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub accumulator: Arc<PathwayAccumulator<SqlPathwayRepository>>,
    pub audit_store: SqlAuditStore,
}

impl Application {
    /// The generation client stays pluggable; the rest of the turn pipeline
    /// is wired from the bootstrapped state.
    pub fn turn_runtime(
        &self,
        llm: Arc<dyn LlmClient>,
        audit: Arc<dyn AuditSink>,
    ) -> TurnRuntime<SqlPathwayRepository> {
        TurnRuntime::new(
            llm,
            Arc::clone(&self.accumulator),
            audit,
            self.config.policy.max_regenerations,
            self.config.policy.noise_bypass_enabled,
            CheckpointTargets {
                checkpoint_a_ms: self.config.timing.checkpoint_a_target_ms,
                checkpoint_b_ms: self.config.timing.checkpoint_b_target_ms,
                checkpoint_c_ms: self.config.timing.checkpoint_c_target_ms,
            },
        )
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level; a second call is a no-op.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;

    let db_pool =
        connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let repository = Arc::new(SqlPathwayRepository::new(db_pool.clone()));
    let accumulator = Arc::new(PathwayAccumulator::new(repository));
    let audit_store = SqlAuditStore::new(db_pool.clone());

    Ok(Application { config, db_pool, accumulator, audit_store })
}

#[cfg(test)]
mod tests {
    use attune_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use super::bootstrap;

    fn memory_overrides() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_on_a_fresh_database() {
        let app = bootstrap(memory_overrides()).await.expect("bootstrap succeeds");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('pathway', 'conversation_session', 'audit_event')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables queryable");
        assert_eq!(table_count, 3, "bootstrap should expose the baseline schema");
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_provider_config() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_provider: Some(LlmProvider::Anthropic),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("expected config error").to_string();
        assert!(message.contains("llm.api_key"));
    }
}
