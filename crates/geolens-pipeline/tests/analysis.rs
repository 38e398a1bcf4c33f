//! End-to-end analysis runs with mocked providers and an in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use geolens_core::{
    builtin_rules, BatchState, BrandProfile, KpiScores, ProjectContext, Provenance,
};
use geolens_pipeline::{run_analysis, BatchOrchestrator, PipelineError};
use geolens_providers::{AdapterLimits, ProviderAdapter, ProviderKind, ProviderRegistry};
use geolens_store::{InMemoryReportStore, ReportStore};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Valid for every pipeline's shape at once.
const ANSWER: &str = r#"{
  "brands_mentioned": ["Fizzco", "Acme Sparkling"],
  "valence": 0.5,
  "status": "positive",
  "keywords": ["crisp"],
  "winner": "Acme Sparkling",
  "differentiators": ["taste"],
  "alignment_score": 80,
  "matched_attributes": ["organic"],
  "brand_score": 75,
  "competitor_score": 60,
  "reasoning": "better ingredients",
  "scores": {"authority": 80, "freshness": 60, "structure": 70, "brand_alignment": 90},
  "issues": ["no FAQ section"],
  "explanation": "solid product pages",
  "has_date_signals": true
}"#;

fn limits() -> AdapterLimits {
    AdapterLimits {
        timeout_secs: 10,
        max_concurrency: 4,
        max_retries: 0,
        backoff_base_ms: 0,
    }
}

fn project() -> ProjectContext {
    ProjectContext {
        id: "acme".to_string(),
        brand: BrandProfile {
            name: "Acme Sparkling".to_string(),
            domain: Some("acme.example".to_string()),
            attributes: vec!["organic".to_string()],
            keywords: Vec::new(),
        },
        market: Some("United States".to_string()),
        categories: vec!["sparkling water".to_string()],
        competitors: vec!["Fizzco".to_string()],
        pages: Vec::new(),
        models: vec!["openai".to_string()],
    }
}

async fn server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-test",
            "choices": [{ "message": { "role": "assistant", "content": ANSWER } }],
            "usage": { "prompt_tokens": 30, "completion_tokens": 40 }
        }))
    } else {
        ResponseTemplate::new(status).set_body_string("unavailable")
    };
    Mock::given(method("POST"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

fn registry(base_url: &str) -> ProviderRegistry {
    ProviderRegistry::from_adapters(vec![Arc::new(
        ProviderAdapter::with_base_url(ProviderKind::OpenAi, "test-key", "gpt-test", base_url, limits())
            .unwrap(),
    )])
}

#[tokio::test]
async fn analysis_scores_and_saves_a_report() {
    let server = server(200).await;
    let store = InMemoryReportStore::new();

    let outcome = run_analysis(
        &BatchOrchestrator::default(),
        &registry(&server.uri()),
        &project(),
        &builtin_rules().unwrap(),
        &store,
        &CancellationToken::new(),
    )
    .await
    .expect("analysis should succeed");

    let report = &outcome.report;
    let batch = report.batch.as_ref().unwrap();
    assert_eq!(batch.state, BatchState::Complete);
    // spontaneous, sentiment, accuracy, comparison, brand battle, project KPI
    assert_eq!(batch.total_cells, 6);
    assert_eq!(batch.succeeded, 6);

    assert!((report.brand_metrics.mention_rate - 100.0).abs() < 1e-9);
    assert!((report.brand_metrics.sentiment_score - 75.0).abs() < 1e-9);
    assert!((report.brand_metrics.battle_win_rate - 100.0).abs() < 1e-9);
    let fizzco = report.competitor("Fizzco").unwrap();
    assert!((fizzco.mention_rate - 100.0).abs() < 1e-9);
    assert_eq!(fizzco.battles_won, 0);

    assert_eq!(report.unified_kpi.len(), 1);
    let kpi = &report.unified_kpi[0];
    assert_eq!(
        kpi.scores,
        KpiScores {
            authority: 80.0,
            freshness: 60.0,
            structure: 70.0,
            brand_alignment: 90.0,
        }
    );
    assert_eq!(kpi.provenance, Provenance::Extracted);
    assert_eq!(kpi.llm_data.provider, "openai");
    assert!(kpi.llm_data.prompt.contains("Acme Sparkling"));
    assert!(kpi.llm_data.prompt.contains("Respond with a single JSON object"));
    assert!(kpi.llm_data.response.contains("brand_alignment"));

    assert!((0.0..=100.0).contains(&report.scorecard.global_score));

    let now = Utc::now();
    let stored = store
        .find_by_project_and_range("acme", now - Duration::hours(1), now + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, report.id);
}

#[tokio::test]
async fn all_cells_failing_is_an_error_and_nothing_is_saved() {
    let server = server(503).await;
    let store = InMemoryReportStore::new();

    let err = run_analysis(
        &BatchOrchestrator::default(),
        &registry(&server.uri()),
        &project(),
        &builtin_rules().unwrap(),
        &store,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        PipelineError::AnalysisFailed { state, diagnostics } => {
            assert_eq!(state, BatchState::Failed);
            assert!(diagnostics.contains("503"), "unexpected diagnostics: {diagnostics}");
        }
        other => panic!("expected AnalysisFailed, got {other:?}"),
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn project_listing_only_unavailable_models_is_rejected() {
    let server = server(200).await;
    let mut project = project();
    project.models = vec!["anthropic".to_string()];

    let err = run_analysis(
        &BatchOrchestrator::default(),
        &registry(&server.uri()),
        &project,
        &builtin_rules().unwrap(),
        &InMemoryReportStore::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::NoModelsSelected));
}
