//! `schedule`: periodic analysis runs, producing the report history that
//! `trend` reads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geolens_core::{load_project, AppConfig, ScoringRules};
use geolens_pipeline::{run_analysis, BatchOrchestrator};
use geolens_providers::ProviderRegistry;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::analyze::load_rules_or_builtin;
use crate::store::CliStore;

struct ScheduledRun {
    project_path: PathBuf,
    rules: ScoringRules,
    registry: ProviderRegistry,
    orchestrator: BatchOrchestrator,
    store: CliStore,
    shutdown: CancellationToken,
}

impl ScheduledRun {
    async fn run_once(&self) {
        // Reloaded each tick so refreshed page signals are picked up.
        let project = match load_project(&self.project_path) {
            Ok(project) => project,
            Err(e) => {
                tracing::error!(
                    path = %self.project_path.display(),
                    error = %e,
                    "scheduler: failed to load project"
                );
                return;
            }
        };

        let cancel = self.shutdown.child_token();
        match run_analysis(
            &self.orchestrator,
            &self.registry,
            &project,
            &self.rules,
            &self.store,
            &cancel,
        )
        .await
        {
            Ok(outcome) => tracing::info!(
                project = %project.id,
                report_id = %outcome.report.id,
                global_score = outcome.report.scorecard.global_score,
                state = %outcome.execution.state,
                "scheduler: analysis complete"
            ),
            Err(e) => tracing::error!(
                project = %project.id,
                error = %e,
                "scheduler: analysis failed"
            ),
        }
    }
}

pub(crate) async fn run_schedule(
    config: &AppConfig,
    project_path: &Path,
    cron: &str,
) -> anyhow::Result<()> {
    // Fail fast on a bad project file rather than at the first tick.
    let project = load_project(project_path)?;
    let shutdown = CancellationToken::new();

    let run = Arc::new(ScheduledRun {
        project_path: project_path.to_path_buf(),
        rules: load_rules_or_builtin(&config.rules_path)?,
        registry: ProviderRegistry::from_config(config)?,
        orchestrator: BatchOrchestrator::from_config(config),
        store: CliStore::from_config(config).await?,
        shutdown: shutdown.clone(),
    });

    let mut scheduler = JobScheduler::new().await?;
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let run = Arc::clone(&run);
        Box::pin(async move {
            tracing::info!("scheduler: starting analysis run");
            run.run_once().await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(project = %project.id, cron = %cron, "scheduler: registered analysis job");

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    shutdown.cancel();
    scheduler.shutdown().await?;
    Ok(())
}
