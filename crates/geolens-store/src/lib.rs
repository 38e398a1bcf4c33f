//! Persistence for analysis reports.
//!
//! [`ReportStore`] is the contract the pipeline writes through and the trend
//! engine reads from. [`PgReportStore`] keeps reports in Postgres as JSONB
//! documents; [`InMemoryReportStore`] backs tests and runs without a database.

mod memory;
mod reports;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use geolens_core::{AppConfig, Report};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub use memory::InMemoryReportStore;
pub use reports::{PgReportStore, ReportRow};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/geolens-store/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("report {0} already exists")]
    Duplicate(uuid::Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("report document error: {0}")]
    Document(#[from] serde_json::Error),
}

/// Where reports are written and read back for trend analysis.
pub trait ReportStore: Send + Sync {
    /// Persist a report. Reports are immutable; saving the same id twice fails.
    fn save(&self, report: &Report) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reports for `project_id` created in `[start, end)`, oldest first.
    fn find_by_project_and_range(
        &self,
        project_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Report>, StoreError>> + Send;
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect using `AppConfig.database_url` and its pool settings.
///
/// # Errors
///
/// Returns [`StoreError::MissingDatabaseUrl`] if no URL is configured, or
/// [`StoreError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_config(config: &AppConfig) -> Result<PgPool, StoreError> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or(StoreError::MissingDatabaseUrl)?;
    connect_pool(database_url, PoolConfig::from_app_config(config))
        .await
        .map_err(StoreError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat that as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}
