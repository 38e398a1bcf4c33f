//! `analyze`: one full pipeline run for a project file.

use std::path::Path;
use std::time::Duration;

use geolens_core::{builtin_rules, load_project, load_rules, AppConfig, ScoringRules};
use geolens_pipeline::{run_analysis, BatchOrchestrator};
use geolens_providers::ProviderRegistry;
use tokio_util::sync::CancellationToken;

use crate::store::CliStore;

/// Load the configured rules, or the built-in set when the file is absent.
///
/// A file that exists but fails validation is an error, not a fallback.
pub(crate) fn load_rules_or_builtin(path: &Path) -> anyhow::Result<ScoringRules> {
    if path.exists() {
        return Ok(load_rules(path)?);
    }
    tracing::warn!(path = %path.display(), "rules file not found; using built-in rules");
    Ok(builtin_rules()?)
}

pub(crate) async fn run_analyze(
    config: &AppConfig,
    project_path: &Path,
    models: Vec<String>,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    let mut project = load_project(project_path)?;
    if !models.is_empty() {
        project.models = models;
    }
    let rules = load_rules_or_builtin(&config.rules_path)?;
    let registry = ProviderRegistry::from_config(config)?;
    let mut orchestrator = BatchOrchestrator::from_config(config);
    if let Some(secs) = timeout_secs {
        orchestrator = orchestrator.with_batch_timeout(Duration::from_secs(secs));
    }
    let store = CliStore::from_config(config).await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling batch");
                cancel.cancel();
            }
        })
    };

    let result = run_analysis(&orchestrator, &registry, &project, &rules, &store, &cancel).await;
    interrupt.abort();

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    Ok(())
}
