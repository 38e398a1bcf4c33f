//! Postgres-backed [`ReportStore`].

use chrono::{DateTime, Utc};
use geolens_core::Report;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{ReportStore, StoreError};

/// A row from the `reports` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub project_id: String,
    pub brand_name: String,
    pub rules_version: String,
    pub global_score: f64,
    pub batch_state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub document: serde_json::Value,
}

impl ReportRow {
    /// Decode the stored document back into a [`Report`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Document`] if the JSON no longer matches the
    /// `Report` shape.
    pub fn into_report(self) -> Result<Report, StoreError> {
        Ok(serde_json::from_value(self.document)?)
    }
}

#[derive(Debug, Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ReportStore for PgReportStore {
    async fn save(&self, report: &Report) -> Result<(), StoreError> {
        let document = serde_json::to_value(report)?;
        let batch_state = report.batch.as_ref().map(|b| b.state.to_string());

        let result = sqlx::query(
            "INSERT INTO reports \
                 (id, project_id, brand_name, rules_version, global_score, batch_state, created_at, document) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(report.id)
        .bind(&report.project_id)
        .bind(&report.brand_name)
        .bind(&report.rules_version)
        .bind(report.scorecard.global_score)
        .bind(batch_state)
        .bind(report.created_at)
        .bind(document)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(report.id));
        }

        tracing::info!(
            report_id = %report.id,
            project_id = %report.project_id,
            global_score = report.scorecard.global_score,
            "report saved"
        );
        Ok(())
    }

    async fn find_by_project_and_range(
        &self,
        project_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            "SELECT id, project_id, brand_name, rules_version, global_score, batch_state, \
                    created_at, document \
             FROM reports \
             WHERE project_id = $1 AND created_at >= $2 AND created_at < $3 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(project_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportRow::into_report).collect()
    }
}
