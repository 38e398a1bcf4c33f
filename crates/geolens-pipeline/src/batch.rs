//! Fans a prompt battery out across the selected models and collects one
//! outcome per (model, prompt) cell.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use geolens_core::{
    AppConfig, BatchState, BatchSummary, CellSignal, PipelineType, ProjectContext, ProviderUsage,
    StructuredJudgment,
};
use geolens_providers::{CallOptions, ProviderAdapter, ProviderError, ProviderKind, RawResponse};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::BatchContext;
use crate::extract::{extract, normalize_for_brand, Repair};
use crate::templates::PromptInstance;

const MAX_DIAGNOSTICS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    ProviderError,
    /// The provider rejected the request itself (4xx other than auth and rate limits).
    MalformedRequest,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::ProviderError => write!(f, "provider_error"),
            FailureKind::MalformedRequest => write!(f, "malformed_request"),
        }
    }
}

fn classify(err: &ProviderError) -> FailureKind {
    match err {
        ProviderError::Timeout { .. } => FailureKind::Timeout,
        ProviderError::Http(e) if e.is_timeout() => FailureKind::Timeout,
        ProviderError::Status { status, .. } if matches!(status, 400 | 404 | 413 | 422) => {
            FailureKind::MalformedRequest
        }
        _ => FailureKind::ProviderError,
    }
}

#[derive(Debug, Clone)]
pub enum CellOutcome {
    Succeeded {
        response: RawResponse,
        judgment: StructuredJudgment,
    },
    Failed {
        kind: FailureKind,
        detail: String,
    },
    Cancelled,
}

/// One (model, prompt) unit of work and how it ended.
#[derive(Debug, Clone)]
pub struct BatchCell {
    pub provider: ProviderKind,
    pub model: String,
    pub prompt_id: String,
    pub pipeline: PipelineType,
    pub subject: Option<String>,
    pub outcome: CellOutcome,
}

impl BatchCell {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CellOutcome::Succeeded { .. })
    }

    #[must_use]
    pub fn signal(&self) -> CellSignal {
        let judgment = match &self.outcome {
            CellOutcome::Succeeded { judgment, .. } => Some(judgment.clone()),
            CellOutcome::Failed { .. } | CellOutcome::Cancelled => None,
        };
        CellSignal {
            provider: self.provider.to_string(),
            model: self.model.clone(),
            pipeline: self.pipeline,
            subject: self.subject.clone(),
            judgment,
        }
    }
}

/// Everything one batch produced. Cells are in completion order.
#[derive(Debug, Clone)]
pub struct BatchExecution {
    pub batch_id: Uuid,
    pub correlation_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cells: Vec<BatchCell>,
    pub state: BatchState,
    pub usage: Vec<ProviderUsage>,
}

impl BatchExecution {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.cells.iter().filter(|c| c.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Failed { .. }))
            .count()
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Cancelled))
            .count()
    }

    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.batch_id,
            correlation_id: self.correlation_id,
            state: self.state,
            total_cells: self.cells.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            cancelled: self.cancelled(),
            usage: self.usage.clone(),
        }
    }

    #[must_use]
    pub fn cell_signals(&self) -> Vec<CellSignal> {
        self.cells.iter().map(BatchCell::signal).collect()
    }

    /// A short human-readable account of the first failures.
    #[must_use]
    pub fn diagnostics(&self) -> String {
        let failures: Vec<String> = self
            .cells
            .iter()
            .filter_map(|c| match &c.outcome {
                CellOutcome::Failed { kind, detail } => {
                    Some(format!("{}/{} {kind}: {detail}", c.provider, c.pipeline))
                }
                _ => None,
            })
            .collect();

        if failures.is_empty() {
            return format!(
                "{} of {} cells cancelled",
                self.cancelled(),
                self.cells.len()
            );
        }

        let shown = failures
            .iter()
            .take(MAX_DIAGNOSTICS)
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        if failures.len() > MAX_DIAGNOSTICS {
            format!("{shown}; and {} more", failures.len() - MAX_DIAGNOSTICS)
        } else {
            shown
        }
    }
}

fn batch_state(total: usize, succeeded: usize, cancelled: usize) -> BatchState {
    if total > 0 && succeeded == total {
        BatchState::Complete
    } else if succeeded > 0 {
        BatchState::Partial
    } else if cancelled > 0 {
        BatchState::Cancelled
    } else {
        BatchState::Failed
    }
}

/// Runs prompt batteries against a set of provider adapters.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    call_options: CallOptions,
    per_provider_concurrency: usize,
    cell_timeout: Duration,
    batch_timeout: Duration,
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        Self {
            call_options: CallOptions::default(),
            per_provider_concurrency: 4,
            cell_timeout: Duration::from_secs(180),
            batch_timeout: Duration::from_secs(600),
        }
    }
}

impl BatchOrchestrator {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            call_options: CallOptions {
                model: None,
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                timeout: Duration::from_secs(config.provider_timeout_secs),
                system: None,
                json_mode: false,
                max_retries: Some(config.provider_max_retries),
            },
            per_provider_concurrency: config.provider_max_concurrency.max(1),
            cell_timeout: Duration::from_secs(config.cell_timeout_secs),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
        }
    }

    #[must_use]
    pub fn with_cell_timeout(mut self, timeout: Duration) -> Self {
        self.cell_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, per_provider: usize) -> Self {
        self.per_provider_concurrency = per_provider.max(1);
        self
    }

    #[must_use]
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.call_options = options;
        self
    }

    #[must_use]
    pub fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }

    /// Send every prompt to every model and wait for all cells.
    ///
    /// Each provider runs up to `per_provider_concurrency` cells at once,
    /// independently of the other providers.
    ///
    /// No cell failure stops the batch. Cancelling `cancel` turns queued and
    /// in-flight cells into [`CellOutcome::Cancelled`]; hitting the batch
    /// deadline turns them into [`FailureKind::Timeout`] failures.
    pub async fn run_batch(
        &self,
        ctx: &BatchContext,
        project: &ProjectContext,
        models: &[Arc<ProviderAdapter>],
        prompts: &[PromptInstance],
        cancel: &CancellationToken,
    ) -> BatchExecution {
        let total = models.len() * prompts.len();
        tracing::info!(
            correlation_id = %ctx.correlation_id,
            batch_id = %ctx.batch_id,
            project = %project.id,
            models = models.len(),
            prompts = prompts.len(),
            cells = total,
            "starting batch"
        );

        let deadline = cancel.child_token();
        let timer = {
            let deadline = deadline.clone();
            let timeout = self.batch_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                deadline.cancel();
            })
        };

        let brand = project.brand_name();
        let width = self.per_provider_concurrency;
        let deadline_ref = &deadline;

        // One lane per provider, merged, so a saturated provider never holds
        // up the others.
        let lanes = models.iter().map(move |adapter| {
            stream::iter(prompts)
                .map(move |prompt| {
                    self.run_cell(ctx, brand, adapter, prompt, deadline_ref, cancel)
                })
                .buffer_unordered(width)
                .boxed()
        });
        let cells: Vec<BatchCell> = stream::select_all(lanes).collect().await;

        timer.abort();

        let succeeded = cells.iter().filter(|c| c.is_success()).count();
        let cancelled = cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Cancelled))
            .count();
        let state = batch_state(cells.len(), succeeded, cancelled);

        let execution = BatchExecution {
            batch_id: ctx.batch_id,
            correlation_id: ctx.correlation_id,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
            cells,
            state,
            usage: ctx.usage_summary(),
        };

        tracing::info!(
            correlation_id = %ctx.correlation_id,
            batch_id = %ctx.batch_id,
            %state,
            succeeded,
            failed = execution.failed(),
            cancelled,
            "batch finished"
        );
        execution
    }

    async fn run_cell(
        &self,
        ctx: &BatchContext,
        brand: &str,
        adapter: &Arc<ProviderAdapter>,
        prompt: &PromptInstance,
        deadline: &CancellationToken,
        cancel: &CancellationToken,
    ) -> BatchCell {
        let outcome = tokio::select! {
            biased;
            () = deadline.cancelled() => {
                if cancel.is_cancelled() {
                    CellOutcome::Cancelled
                } else {
                    CellOutcome::Failed {
                        kind: FailureKind::Timeout,
                        detail: format!(
                            "batch deadline of {}s exceeded",
                            self.batch_timeout.as_secs()
                        ),
                    }
                }
            }
            outcome = self.execute(ctx, brand, adapter, prompt) => outcome,
        };

        let model = match &outcome {
            CellOutcome::Succeeded { response, .. } => response.model.clone(),
            CellOutcome::Failed { kind, detail } => {
                tracing::warn!(
                    correlation_id = %ctx.correlation_id,
                    provider = %adapter.kind(),
                    prompt_id = %prompt.id,
                    pipeline = %prompt.pipeline,
                    failure = %kind,
                    %detail,
                    "cell failed"
                );
                adapter.model().to_string()
            }
            CellOutcome::Cancelled => adapter.model().to_string(),
        };

        BatchCell {
            provider: adapter.kind(),
            model,
            prompt_id: prompt.id.clone(),
            pipeline: prompt.pipeline,
            subject: prompt.subject.clone(),
            outcome,
        }
    }

    async fn execute(
        &self,
        ctx: &BatchContext,
        brand: &str,
        adapter: &ProviderAdapter,
        prompt: &PromptInstance,
    ) -> CellOutcome {
        // Held across the call and any repair so a cell never waits on itself.
        let _permit = match adapter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return CellOutcome::Failed {
                    kind: classify(&e),
                    detail: e.to_string(),
                }
            }
        };

        let options = CallOptions {
            json_mode: adapter.capabilities().structured_output,
            ..self.call_options.clone()
        };
        let text = prompt.sent_text();

        let work = async {
            let response = match adapter.call(&text, &options).await {
                Ok(response) => response.with_prompt_id(&prompt.id),
                Err(e) => {
                    ctx.record_failure(adapter.kind());
                    return CellOutcome::Failed {
                        kind: classify(&e),
                        detail: e.to_string(),
                    };
                }
            };
            ctx.record_success(adapter.kind(), response.usage);

            let repair = Repair {
                adapter,
                options: &options,
            };
            let extraction = extract(&response, prompt.pipeline, Some(repair)).await;
            if let Some(usage) = extraction.repair_usage {
                ctx.record_success(adapter.kind(), usage);
            }
            if extraction.repair_failed {
                ctx.record_failure(adapter.kind());
            }

            let mut judgment = extraction.judgment;
            normalize_for_brand(&mut judgment, brand);
            CellOutcome::Succeeded { response, judgment }
        };

        match tokio::time::timeout(self.cell_timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => CellOutcome::Failed {
                kind: FailureKind::Timeout,
                detail: format!("cell exceeded {}s", self.cell_timeout.as_secs()),
            },
        }
    }
}
