use chrono::TimeZone;
use chrono::Utc;

use super::*;

#[test]
fn parses_analyze_with_model_list() {
    let cli = Cli::try_parse_from([
        "geolens",
        "analyze",
        "--project",
        "acme.yaml",
        "--models",
        "openai,claude",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Analyze {
            project,
            models,
            timeout_secs,
        } => {
            assert_eq!(project, PathBuf::from("acme.yaml"));
            assert_eq!(models, vec!["openai".to_string(), "claude".to_string()]);
            assert_eq!(timeout_secs, None);
        }
        other => panic!("expected analyze, got {other:?}"),
    }
}

#[test]
fn trend_metric_defaults_to_mention_rate() {
    let cli = Cli::try_parse_from([
        "geolens",
        "trend",
        "--project-id",
        "acme",
        "--current-start",
        "2026-03-01",
        "--current-end",
        "2026-03-31",
        "--prior-start",
        "2026-02-01",
        "--prior-end",
        "2026-02-28",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Trend {
            metric: Metric::MentionRate,
            ..
        }
    ));
}

#[test]
fn trend_rejects_unknown_metric() {
    let result = Cli::try_parse_from([
        "geolens",
        "trend",
        "--project-id",
        "acme",
        "--current-start",
        "2026-03-01",
        "--current-end",
        "2026-03-31",
        "--prior-start",
        "2026-02-01",
        "--prior-end",
        "2026-02-28",
        "--metric",
        "revenue",
    ]);
    assert!(result.is_err());
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["geolens"]).is_err());
}

#[test]
fn periods_cover_whole_days() {
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let periods = trend::Periods::from_days(
        day(2026, 3, 1),
        day(2026, 3, 31),
        day(2026, 2, 1),
        day(2026, 2, 28),
    )
    .unwrap();

    assert_eq!(
        periods.current.0,
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        periods.current.1,
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(
        periods.prior.1,
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn inverted_period_is_rejected() {
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let err = trend::Periods::from_days(
        day(2026, 3, 31),
        day(2026, 3, 1),
        day(2026, 2, 1),
        day(2026, 2, 28),
    )
    .unwrap_err();
    assert!(err.to_string().contains("before it starts"));
}

#[test]
fn missing_rules_file_falls_back_to_builtin() {
    let rules =
        analyze::load_rules_or_builtin(std::path::Path::new("/nonexistent/geolens/rules.yaml"))
            .unwrap();
    assert!(!rules.rules.is_empty());
}
