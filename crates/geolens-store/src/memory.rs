use chrono::{DateTime, Utc};
use geolens_core::Report;
use tokio::sync::RwLock;

use crate::{ReportStore, StoreError};

/// Process-local [`ReportStore`]. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<Vec<Report>>,
}

impl InMemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

impl ReportStore for InMemoryReportStore {
    async fn save(&self, report: &Report) -> Result<(), StoreError> {
        let mut reports = self.reports.write().await;
        if reports.iter().any(|r| r.id == report.id) {
            return Err(StoreError::Duplicate(report.id));
        }
        reports.push(report.clone());
        Ok(())
    }

    async fn find_by_project_and_range(
        &self,
        project_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.read().await;
        let mut found: Vec<Report> = reports
            .iter()
            .filter(|r| r.project_id == project_id && r.created_at >= start && r.created_at < end)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}
