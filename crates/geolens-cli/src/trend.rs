//! `trend`: period-over-period variations from stored reports.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use geolens_core::AppConfig;
use geolens_scoring::{compute_all_variations, compute_model_variations, Metric, VariationResult};
use geolens_store::ReportStore;
use serde::Serialize;

use crate::store::connect_postgres;

/// Two half-open UTC ranges built from inclusive calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Periods {
    pub current: (DateTime<Utc>, DateTime<Utc>),
    pub prior: (DateTime<Utc>, DateTime<Utc>),
}

impl Periods {
    pub(crate) fn from_days(
        current_start: NaiveDate,
        current_end: NaiveDate,
        prior_start: NaiveDate,
        prior_end: NaiveDate,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            current: day_range(current_start, current_end)?,
            prior: day_range(prior_start, prior_end)?,
        })
    }
}

fn day_range(start: NaiveDate, end: NaiveDate) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    if end < start {
        anyhow::bail!("period ends ({end}) before it starts ({start})");
    }
    let after_end = end
        .succ_opt()
        .ok_or_else(|| anyhow::anyhow!("period end {end} is out of range"))?;
    Ok((
        start.and_time(NaiveTime::MIN).and_utc(),
        after_end.and_time(NaiveTime::MIN).and_utc(),
    ))
}

#[derive(Debug, Serialize)]
struct TrendOutput {
    project_id: String,
    metric: Metric,
    current_reports: usize,
    prior_reports: usize,
    /// The brand first, then competitors by name.
    entities: Vec<VariationResult>,
    models: Vec<VariationResult>,
}

pub(crate) async fn run_trend(
    config: &AppConfig,
    project_id: &str,
    periods: &Periods,
    metric: Metric,
) -> anyhow::Result<()> {
    if config.database_url.is_none() {
        anyhow::bail!("trend reads stored reports; set DATABASE_URL");
    }
    let store = connect_postgres(config).await?;

    let current = store
        .find_by_project_and_range(project_id, periods.current.0, periods.current.1)
        .await?;
    let prior = store
        .find_by_project_and_range(project_id, periods.prior.0, periods.prior.1)
        .await?;

    let Some(brand_name) = current
        .last()
        .or_else(|| prior.last())
        .map(|r| r.brand_name.clone())
    else {
        anyhow::bail!("no reports for project '{project_id}' in either period");
    };

    tracing::info!(
        project_id,
        %metric,
        current_reports = current.len(),
        prior_reports = prior.len(),
        "computing variations"
    );

    let output = TrendOutput {
        project_id: project_id.to_string(),
        metric,
        current_reports: current.len(),
        prior_reports: prior.len(),
        entities: compute_all_variations(&brand_name, &current, &prior, metric),
        models: compute_model_variations(&current, &prior, metric),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
