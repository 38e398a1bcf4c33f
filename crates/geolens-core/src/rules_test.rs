use super::*;

fn band(min: Option<f64>, max: Option<f64>, score: f64) -> ScoringThreshold {
    ScoringThreshold {
        min,
        max,
        score,
        description: format!("band scoring {score}"),
    }
}

fn minimal_yaml(weights: &str) -> String {
    format!(
        r"
version: test
global_score_formula:
  weights:
{weights}
rules:
  - id: authority.citations
    dimension: authority
    signal: citation_count
    weight: 1
    thresholds:
      - {{ max: 1, score: 10, description: none }}
      - {{ min: 1, score: 90, description: some }}
"
    )
}

#[test]
fn builtin_rules_load_and_validate() {
    let rules = builtin_rules().expect("bundled rules must be valid");
    assert_eq!(rules.version, "2026.1");
    assert!(!rules.rules.is_empty());
    let sum: f64 = rules.global_score_formula.weights.values().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn builtin_threshold_tables_cover_every_real_number() {
    let rules = builtin_rules().unwrap();
    let probes = [
        f64::MIN,
        -1_000_000.0,
        -1.0,
        0.0,
        0.5,
        1.0,
        2.999,
        3.0,
        29.0,
        30.0,
        74.99,
        75.0,
        364.0,
        365.0,
        1_000_000.0,
        f64::MAX,
        f64::INFINITY,
        f64::NEG_INFINITY,
    ];
    for rule in rules.rules.iter().filter(|r| !r.thresholds.is_empty()) {
        for value in probes {
            let matches = rule
                .thresholds
                .iter()
                .filter(|t| t.contains(value))
                .count();
            assert_eq!(
                matches, 1,
                "rule '{}' maps {value} to {matches} thresholds",
                rule.id
            );
        }
    }
}

#[test]
fn weights_not_summing_to_one_are_rejected() {
    let yaml = minimal_yaml("    authority: 0.5\n    freshness: 0.3");
    let err = parse_rules("test", &yaml).unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("sum to 1.0")),
        "unexpected error: {err:?}"
    );
}

#[test]
fn weights_summing_to_one_are_accepted() {
    let yaml = minimal_yaml("    authority: 0.7\n    freshness: 0.3");
    let rules = parse_rules("test", &yaml).unwrap();
    assert!((rules.global_score_formula.weight(Dimension::Authority) - 0.7).abs() < 1e-12);
    assert!(rules.global_score_formula.weight(Dimension::Structure).abs() < 1e-12);
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = parse_rules("broken.yaml", "version: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::FileParse { ref path, .. } if path == "broken.yaml"));
}

#[test]
fn table_with_gap_is_rejected() {
    let table = vec![
        band(None, Some(10.0), 10.0),
        band(Some(20.0), None, 90.0),
    ];
    let err = validate_threshold_table("gap", &table).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("contiguous")));
}

#[test]
fn table_with_overlap_is_rejected() {
    let table = vec![
        band(None, Some(20.0), 10.0),
        band(Some(10.0), None, 90.0),
    ];
    assert!(validate_threshold_table("overlap", &table).is_err());
}

#[test]
fn table_bounded_below_is_rejected() {
    let table = vec![band(Some(0.0), Some(10.0), 10.0), band(Some(10.0), None, 90.0)];
    let err = validate_threshold_table("bounded", &table).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("lower bound")));
}

#[test]
fn table_with_score_above_hundred_is_rejected() {
    let table = vec![band(None, Some(10.0), 10.0), band(Some(10.0), None, 120.0)];
    assert!(validate_threshold_table("score", &table).is_err());
}

#[test]
fn page_rule_without_thresholds_is_rejected() {
    let yaml = r"
version: test
global_score_formula:
  weights:
    authority: 1.0
rules:
  - id: authority.citations
    dimension: authority
    signal: citation_count
    weight: 1
";
    let err = parse_rules("test", yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("threshold table")));
}

#[test]
fn llm_rule_without_thresholds_is_accepted() {
    let yaml = r"
version: test
global_score_formula:
  weights:
    authority: 1.0
rules:
  - id: authority.llm
    dimension: authority
    signal: llm_authority
    weight: 1
";
    assert!(parse_rules("test", yaml).is_ok());
}

#[test]
fn duplicate_rule_ids_are_rejected() {
    let mut rules = builtin_rules().unwrap();
    let dup = rules.rules[0].clone();
    rules.rules.push(dup);
    let err = rules.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("duplicate rule id")));
}

#[test]
fn applicability_defaults_to_full() {
    let rules = builtin_rules().unwrap();
    assert_eq!(
        rules.applicability(PageCategory::Article, Dimension::Freshness),
        Applicability::Full
    );
    assert_eq!(
        rules.applicability(PageCategory::Homepage, Dimension::Freshness),
        Applicability::Limited
    );
    assert_eq!(
        rules.applicability(PageCategory::Legal, Dimension::Authority),
        Applicability::Excluded
    );
    assert!(rules.is_page_excluded(PageCategory::Legal));
    assert_eq!(rules.multiplier(Applicability::Limited), Some(0.3));
    assert_eq!(rules.multiplier(Applicability::Excluded), None);
}

#[test]
fn load_rules_reports_missing_file() {
    let err = load_rules(Path::new("/nonexistent/scoring_rules.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileIo { .. }));
}
