//! Shared configuration and domain types for the geolens workspace.
//!
//! Everything here is plain data plus load-time validation: the env-backed
//! [`AppConfig`], the versioned [`ScoringRules`] document, project files, the
//! crawler's [`PageSignals`] record, structured judgments, and the [`Report`]
//! shape persisted by the store.

pub mod app_config;
pub mod config;
pub mod judgment;
pub mod project;
pub mod report;
pub mod rules;
pub mod signals;
pub mod usage;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, ProviderSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use judgment::{
    refers_to, AccuracyJudgment, BrandBattleJudgment, CellSignal, ComparisonJudgment, Judgment,
    KpiScores, PipelineType, Provenance, SentimentJudgment, SentimentStatus, SpontaneousJudgment,
    StructuredJudgment, UnifiedKpiJudgment,
};
pub use project::{load_project, BrandProfile, ProjectContext, ProjectFile};
pub use report::{
    BatchState, BatchSummary, BrandMetrics, CategoryScore, CompetitorMetrics, LlmAudit,
    ModelMetrics, ProviderUsage, Report, RuleResult, Scorecard, UnifiedKpiResult,
};
pub use rules::{
    builtin_rules, load_rules, parse_rules, Applicability, Dimension, GlobalScoreFormula,
    PageApplicability, ScoringRule, ScoringRules, ScoringThreshold,
};
pub use signals::{PageCategory, PageSignals, SignalKey};
pub use usage::TokenUsage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    FileParse { path: String, reason: String },

    #[error("config validation failed: {0}")]
    Validation(String),
}
