use chrono::{Duration, TimeZone, Utc};
use geolens_core::signals::{ContentMetrics, FreshnessMetrics};
use geolens_core::{
    builtin_rules, parse_rules, KpiScores, PageCategory, PipelineType, StructuredJudgment,
    UnifiedKpiJudgment,
};

use super::*;

const RULES: &str = r"
version: test
global_score_formula:
  weights: { authority: 0.5, freshness: 0.5 }
pass_mark: 60
page_applicability:
  - category: legal
    excluded: true
  - category: product
    dimensions: { freshness: excluded }
  - category: homepage
    dimensions: { authority: partial }
rules:
  - id: authority.citations
    dimension: authority
    signal: citation_count
    weight: 2
    recommendation: Cite sources.
    thresholds:
      - { max: 3, score: 40, description: Few citations }
      - { min: 3, score: 90, description: Well sourced }
  - id: authority.llm
    dimension: authority
    signal: llm_authority
    weight: 1
    recommendation: Build authority.
  - id: freshness.age
    dimension: freshness
    signal: days_since_update
    weight: 1
    recommendation: Update content.
    thresholds:
      - { max: 90, score: 100, description: Recent }
      - { min: 90, score: 20, description: Stale }
";

fn rules() -> ScoringRules {
    parse_rules("test", RULES).unwrap()
}

fn page(url: &str, category: PageCategory, citations: u32, age_days: i64) -> PageSignals {
    let fetched_at = Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap();
    PageSignals {
        url: url.to_string(),
        category,
        fetched_at,
        content: ContentMetrics {
            word_count: 900,
            citation_count: citations,
            author_present: true,
        },
        structure: geolens_core::signals::StructureMetrics::default(),
        freshness: FreshnessMetrics {
            published_at: None,
            modified_at: Some(fetched_at - Duration::days(age_days)),
        },
        brand: geolens_core::signals::PageBrandMetrics::default(),
        snippet: geolens_core::signals::SnippetMetrics::default(),
    }
}

fn kpi_cell(provider: &str, authority: f64) -> CellSignal {
    CellSignal {
        provider: provider.to_string(),
        model: format!("{provider}-model"),
        pipeline: PipelineType::UnifiedKpi,
        subject: None,
        judgment: Some(StructuredJudgment {
            provenance: Provenance::Extracted,
            judgment: Judgment::UnifiedKpi(UnifiedKpiJudgment {
                scores: KpiScores {
                    authority,
                    freshness: 70.0,
                    structure: 70.0,
                    brand_alignment: 70.0,
                },
                details: std::collections::BTreeMap::new(),
                issues: Vec::new(),
                explanation: String::new(),
                has_date_signals: true,
            }),
        }),
    }
}

fn category(dimension: Dimension, score: f64) -> CategoryScore {
    CategoryScore {
        dimension,
        score,
        weight: 0.0,
        applied_rules: 1,
        passed_rules: 1,
        rule_results: Vec::new(),
        issues: Vec::new(),
        recommendations: Vec::new(),
    }
}

#[test]
fn global_score_is_weighted_sum_of_categories() {
    let formula = GlobalScoreFormula {
        weights: [
            (Dimension::Authority, 0.3),
            (Dimension::Freshness, 0.2),
            (Dimension::Structure, 0.2),
            (Dimension::BrandAlignment, 0.3),
        ]
        .into_iter()
        .collect(),
    };
    let categories = vec![
        category(Dimension::Authority, 80.0),
        category(Dimension::Freshness, 60.0),
        category(Dimension::Structure, 70.0),
        category(Dimension::BrandAlignment, 90.0),
    ];
    assert!((global_score(&categories, &formula) - 78.0).abs() < 1e-9);
}

#[test]
fn category_score_combines_page_and_llm_rules() {
    let pages = vec![page("https://acme.example/guide", PageCategory::Article, 6, 30)];
    let cells = vec![kpi_cell("openai", 80.0), {
        let mut c = kpi_cell("gemini", 0.0);
        c.judgment = Some(StructuredJudgment::fallback(PipelineType::UnifiedKpi));
        c
    }];

    let card = score(&pages, &cells, &rules());
    let authority = card.category(Dimension::Authority).unwrap();

    // citations 90 × 2, llm mean(80, 50) = 65 × 1
    assert!((authority.score - 81.67).abs() < 1e-9);
    assert_eq!(authority.applied_rules, 2);
    assert_eq!(authority.passed_rules, 2);

    let llm = authority
        .rule_results
        .iter()
        .find(|r| r.rule_id == "authority.llm")
        .unwrap();
    assert!(llm.page_url.is_none());
    assert!((llm.value - 65.0).abs() < 1e-9);
    assert!(llm.evidence.contains("1 fallback"));

    let freshness = card.category(Dimension::Freshness).unwrap();
    assert!((freshness.score - 100.0).abs() < 1e-9);
    assert!((card.global_score - 90.84).abs() < 0.011);
}

#[test]
fn excluded_page_category_is_not_scored() {
    let pages = vec![
        page("https://acme.example/guide", PageCategory::Article, 6, 30),
        page("https://acme.example/terms", PageCategory::Legal, 0, 900),
    ];
    let card = score(&pages, &[], &rules());
    assert_eq!(card.pages_scored, 1);
    assert_eq!(card.pages_excluded, 1);
    assert!(card
        .categories
        .iter()
        .flat_map(|c| &c.rule_results)
        .all(|r| r.page_url.as_deref() != Some("https://acme.example/terms")));
}

#[test]
fn excluded_dimension_leaves_category_empty() {
    let pages = vec![page("https://acme.example/p/1", PageCategory::Product, 6, 400)];
    let card = score(&pages, &[], &rules());
    let freshness = card.category(Dimension::Freshness).unwrap();
    assert_eq!(freshness.applied_rules, 0);
    assert!(freshness.score.abs() < f64::EPSILON);
    assert_eq!(freshness.issues.len(), 1);
    assert!(freshness.issues[0].contains("no applicable rules"));
}

#[test]
fn partial_applicability_scales_rule_weight() {
    let pages = vec![page("https://acme.example/", PageCategory::Homepage, 1, 10)];
    let card = score(&pages, &[], &rules());
    let result = &card.category(Dimension::Authority).unwrap().rule_results[0];
    assert!((result.weight - 1.2).abs() < 1e-9);
    assert!(!result.passed);
    assert!(card.recommendations.contains(&"Cite sources.".to_string()));
    assert!(card.issues.iter().any(|i| i.starts_with("authority.citations")));
}

#[test]
fn failed_cells_do_not_feed_llm_rules() {
    let pages = vec![page("https://acme.example/guide", PageCategory::Article, 6, 30)];
    let mut failed = kpi_cell("anthropic", 10.0);
    failed.judgment = None;
    let card = score(&pages, &[failed], &rules());
    let authority = card.category(Dimension::Authority).unwrap();
    assert_eq!(authority.applied_rules, 1);
    assert!((authority.score - 90.0).abs() < 1e-9);
}

#[test]
fn builtin_rules_keep_scores_in_range_with_evidence() {
    let rules = builtin_rules().unwrap();
    let pages = vec![
        page("https://acme.example/", PageCategory::Homepage, 0, 2000),
        page("https://acme.example/blog/a", PageCategory::Blog, 12, 3),
        page("https://acme.example/contact", PageCategory::Contact, 0, 0),
    ];
    let cells = vec![kpi_cell("openai", 100.0), kpi_cell("gemini", 0.0)];
    let card = score(&pages, &cells, &rules);

    assert_eq!(card.categories.len(), Dimension::ALL.len());
    for c in &card.categories {
        assert!((0.0..=100.0).contains(&c.score), "{c:?}");
        for r in &c.rule_results {
            assert!(!r.evidence.trim().is_empty());
        }
    }
    assert!((0.0..=100.0).contains(&card.global_score));
}

#[test]
fn rescoring_identical_inputs_is_idempotent() {
    let pages = vec![
        page("https://acme.example/guide", PageCategory::Article, 2, 120),
        page("https://acme.example/", PageCategory::Homepage, 4, 10),
    ];
    let mut cells = vec![
        kpi_cell("openai", 33.3),
        kpi_cell("gemini", 71.1),
        kpi_cell("anthropic", 12.7),
    ];
    let rules = rules();
    let first = score(&pages, &cells, &rules);
    let second = score(&pages, &cells, &rules);
    cells.reverse();
    let reordered = score(&pages, &cells, &rules);

    assert_eq!(first, second);
    assert_eq!(first, reordered);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&reordered).unwrap()
    );
}

#[test]
fn unscored_dimension_is_left_out_of_global_score() {
    let formula = GlobalScoreFormula {
        weights: [(Dimension::Authority, 0.5), (Dimension::Freshness, 0.5)]
            .into_iter()
            .collect(),
    };
    let mut freshness = category(Dimension::Freshness, 0.0);
    freshness.applied_rules = 0;
    let categories = vec![category(Dimension::Authority, 80.0), freshness];
    assert!((global_score(&categories, &formula) - 80.0).abs() < 1e-9);

    let mut authority = category(Dimension::Authority, 0.0);
    authority.applied_rules = 0;
    assert!(global_score(&[authority], &formula).abs() < f64::EPSILON);
}

#[test]
fn project_without_pages_can_reach_full_score() {
    let mut cell = kpi_cell("openai", 100.0);
    if let Some(StructuredJudgment {
        judgment: Judgment::UnifiedKpi(kpi),
        ..
    }) = cell.judgment.as_mut()
    {
        kpi.scores = KpiScores {
            authority: 100.0,
            freshness: 100.0,
            structure: 100.0,
            brand_alignment: 100.0,
        };
    }

    let card = score(&[], &[cell], &builtin_rules().unwrap());
    let snippet = card.category(Dimension::SnippetExtractability).unwrap();
    assert_eq!(snippet.applied_rules, 0);
    assert!(snippet.issues[0].contains("no applicable rules"));
    assert!((card.global_score - 100.0).abs() < 1e-9);
}
