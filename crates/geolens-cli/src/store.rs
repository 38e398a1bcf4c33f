//! Picks the report store for a command: Postgres when `DATABASE_URL` is
//! set, otherwise a process-local store.

use chrono::{DateTime, Utc};
use geolens_core::{AppConfig, Report};
use geolens_store::{
    connect_pool_from_config, run_migrations, InMemoryReportStore, PgReportStore, ReportStore,
    StoreError,
};

pub(crate) enum CliStore {
    Postgres(PgReportStore),
    Memory(InMemoryReportStore),
}

impl CliStore {
    pub(crate) async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        if config.database_url.is_none() {
            tracing::warn!("DATABASE_URL is not set; the report will not be persisted");
            return Ok(Self::Memory(InMemoryReportStore::new()));
        }
        Ok(Self::Postgres(connect_postgres(config).await?))
    }
}

pub(crate) async fn connect_postgres(config: &AppConfig) -> anyhow::Result<PgReportStore> {
    let pool = connect_pool_from_config(config).await?;
    let applied = run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied database migrations");
    }
    Ok(PgReportStore::new(pool))
}

impl ReportStore for CliStore {
    async fn save(&self, report: &Report) -> Result<(), StoreError> {
        match self {
            CliStore::Postgres(store) => store.save(report).await,
            CliStore::Memory(store) => store.save(report).await,
        }
    }

    async fn find_by_project_and_range(
        &self,
        project_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        match self {
            CliStore::Postgres(store) => {
                store
                    .find_by_project_and_range(project_id, start, end)
                    .await
            }
            CliStore::Memory(store) => {
                store
                    .find_by_project_and_range(project_id, start, end)
                    .await
            }
        }
    }
}
