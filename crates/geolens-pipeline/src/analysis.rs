//! One full analysis run: select models, render the battery, run the batch,
//! score, and persist the report.

use chrono::Utc;
use geolens_core::{
    BatchState, Judgment, LlmAudit, PipelineType, ProjectContext, Report, ScoringRules,
    UnifiedKpiResult,
};
use geolens_providers::ProviderRegistry;
use geolens_scoring::build_report;
use geolens_store::ReportStore;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchExecution, BatchOrchestrator, CellOutcome};
use crate::context::BatchContext;
use crate::error::PipelineError;
use crate::templates::{build_prompt_battery, PromptInstance};

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: Report,
    pub execution: BatchExecution,
}

/// Run the whole pipeline for `project` and save the resulting report.
///
/// A report is produced whenever at least one cell succeeded; a partial
/// batch is scored from what came back.
///
/// # Errors
///
/// - [`PipelineError::NoModelsSelected`] if no listed provider is available.
/// - [`PipelineError::NoPrompts`] if every template failed to render.
/// - [`PipelineError::AnalysisFailed`] if no cell succeeded.
/// - [`PipelineError::Store`] if the report cannot be saved.
pub async fn run_analysis<S: ReportStore>(
    orchestrator: &BatchOrchestrator,
    registry: &ProviderRegistry,
    project: &ProjectContext,
    rules: &ScoringRules,
    store: &S,
    cancel: &CancellationToken,
) -> Result<AnalysisOutcome, PipelineError> {
    let models = registry.select(&project.models);
    if models.is_empty() {
        return Err(PipelineError::NoModelsSelected);
    }

    let prompts = build_prompt_battery(project);
    if prompts.is_empty() {
        return Err(PipelineError::NoPrompts);
    }

    let ctx = BatchContext::new();
    let execution = orchestrator
        .run_batch(&ctx, project, &models, &prompts, cancel)
        .await;

    if execution.succeeded() == 0 {
        let state = match execution.state {
            BatchState::Cancelled => BatchState::Cancelled,
            _ => BatchState::Failed,
        };
        tracing::error!(
            correlation_id = %execution.correlation_id,
            project = %project.id,
            %state,
            "analysis produced no usable answers"
        );
        return Err(PipelineError::AnalysisFailed {
            state,
            diagnostics: execution.diagnostics(),
        });
    }

    let report = build_report(
        project,
        &execution.cell_signals(),
        rules,
        unified_kpi_results(&execution, &prompts),
        Some(execution.summary()),
        Utc::now(),
    );

    store.save(&report).await?;
    tracing::info!(
        correlation_id = %execution.correlation_id,
        project = %project.id,
        report_id = %report.id,
        global_score = report.scorecard.global_score,
        state = %execution.state,
        "report saved"
    );

    Ok(AnalysisOutcome { report, execution })
}

/// The audit view of every successful unified-KPI cell, ordered by subject
/// then provider so reports do not depend on completion order.
#[must_use]
pub fn unified_kpi_results(
    execution: &BatchExecution,
    prompts: &[PromptInstance],
) -> Vec<UnifiedKpiResult> {
    let mut results: Vec<UnifiedKpiResult> = execution
        .cells
        .iter()
        .filter(|cell| cell.pipeline == PipelineType::UnifiedKpi)
        .filter_map(|cell| {
            let CellOutcome::Succeeded { response, judgment } = &cell.outcome else {
                return None;
            };
            let Judgment::UnifiedKpi(kpi) = &judgment.judgment else {
                return None;
            };
            let prompt = prompts
                .iter()
                .find(|p| p.id == cell.prompt_id)
                .map(PromptInstance::sent_text)
                .unwrap_or_default();
            Some(UnifiedKpiResult {
                subject: cell.subject.clone(),
                scores: kpi.scores,
                details: kpi.details.clone(),
                issues: kpi.issues.clone(),
                explanation: kpi.explanation.clone(),
                provenance: judgment.provenance,
                llm_data: LlmAudit {
                    provider: cell.provider.to_string(),
                    model: response.model.clone(),
                    prompt,
                    response: response.text.clone(),
                    usage: response.usage,
                },
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.subject
            .cmp(&b.subject)
            .then_with(|| a.llm_data.provider.cmp(&b.llm_data.provider))
    });
    results
}
