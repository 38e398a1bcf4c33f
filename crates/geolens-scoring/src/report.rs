use std::borrow::Cow;

use chrono::{DateTime, Utc};
use geolens_core::{
    BatchSummary, CellSignal, ProjectContext, Report, ScoringRules, UnifiedKpiResult,
};
use uuid::Uuid;

use crate::engine::score;
use crate::metrics::{brand_metrics, competitor_metrics, model_metrics};

/// The rules with the project's brand keywords merged into the configured ones.
#[must_use]
pub fn rules_for_project<'a>(
    rules: &'a ScoringRules,
    project: &ProjectContext,
) -> Cow<'a, ScoringRules> {
    let missing: Vec<&String> = project
        .brand
        .keywords
        .iter()
        .filter(|k| {
            !rules
                .brand_keywords
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(k))
        })
        .collect();
    if missing.is_empty() {
        return Cow::Borrowed(rules);
    }
    let mut merged = rules.clone();
    merged.brand_keywords.extend(missing.into_iter().cloned());
    Cow::Owned(merged)
}

/// Assemble an immutable report for one analysis run.
#[must_use]
pub fn build_report(
    project: &ProjectContext,
    cells: &[CellSignal],
    rules: &ScoringRules,
    unified_kpi: Vec<UnifiedKpiResult>,
    batch: Option<BatchSummary>,
    created_at: DateTime<Utc>,
) -> Report {
    let rules = rules_for_project(rules, project);
    let brand = project.brand_name();

    Report {
        id: Uuid::new_v4(),
        project_id: project.id.clone(),
        brand_name: brand.to_string(),
        created_at,
        rules_version: rules.version.clone(),
        scorecard: score(&project.pages, cells, &rules),
        brand_metrics: brand_metrics(cells, brand),
        model_metrics: model_metrics(cells, brand),
        competitor_metrics: competitor_metrics(cells, &project.competitors),
        unified_kpi,
        batch,
    }
}
