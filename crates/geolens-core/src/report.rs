//! The persisted report document and its parts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::judgment::{KpiScores, Provenance};
use crate::rules::Dimension;
use crate::usage::TokenUsage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub dimension: Dimension,
    /// Page the rule was evaluated on; `None` for judgment-based rules.
    pub page_url: Option<String>,
    pub value: f64,
    pub score: f64,
    /// Effective weight after the page-type multiplier.
    pub weight: f64,
    pub passed: bool,
    /// Why the rule scored what it did. Never empty.
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub dimension: Dimension,
    /// Always within `[0, 100]`.
    pub score: f64,
    pub weight: f64,
    pub applied_rules: usize,
    pub passed_rules: usize,
    pub rule_results: Vec<RuleResult>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// The scored part of a report: a pure function of signals, judgments and rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub global_score: f64,
    pub categories: Vec<CategoryScore>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub pages_scored: usize,
    pub pages_excluded: usize,
}

impl Scorecard {
    #[must_use]
    pub fn category(&self, dimension: Dimension) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.dimension == dimension)
    }
}

/// Brand-level LLM metrics, all on a 0–100 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandMetrics {
    /// Share of spontaneous prompts in which the brand was mentioned.
    pub mention_rate: f64,
    /// Mean sentiment, 0 = fully negative, 50 = neutral, 100 = fully positive.
    pub sentiment_score: f64,
    pub alignment_score: f64,
    /// Share of brand battles the brand won.
    pub battle_win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub provider: String,
    pub model: String,
    pub mention_rate: f64,
    pub sentiment_score: f64,
    pub alignment_score: f64,
    pub cells_attempted: usize,
    pub cells_with_signal: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorMetrics {
    pub name: String,
    pub mention_rate: f64,
    /// Battles against the brand that this competitor won.
    pub battles_won: usize,
    pub battles_total: usize,
}

/// Raw exchange kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAudit {
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub usage: TokenUsage,
}

/// Externally visible shape of one unified-KPI analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedKpiResult {
    pub subject: Option<String>,
    pub scores: KpiScores,
    pub details: BTreeMap<String, String>,
    pub issues: Vec<String>,
    pub explanation: String,
    pub provenance: Provenance,
    pub llm_data: LlmAudit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Complete,
    Partial,
    Failed,
    Cancelled,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchState::Complete => write!(f, "complete"),
            BatchState::Partial => write!(f, "partial"),
            BatchState::Failed => write!(f, "failed"),
            BatchState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub calls: u64,
    pub failures: u64,
    pub usage: TokenUsage,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub correlation_id: Uuid,
    pub state: BatchState,
    pub total_cells: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub usage: Vec<ProviderUsage>,
}

/// A timestamped snapshot for one brand project. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub project_id: String,
    pub brand_name: String,
    pub created_at: DateTime<Utc>,
    pub rules_version: String,
    pub scorecard: Scorecard,
    pub brand_metrics: BrandMetrics,
    pub model_metrics: Vec<ModelMetrics>,
    pub competitor_metrics: Vec<CompetitorMetrics>,
    pub unified_kpi: Vec<UnifiedKpiResult>,
    pub batch: Option<BatchSummary>,
}

impl Report {
    #[must_use]
    pub fn competitor(&self, name: &str) -> Option<&CompetitorMetrics> {
        self.competitor_metrics
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn model(&self, provider: &str) -> Option<&ModelMetrics> {
        self.model_metrics.iter().find(|m| m.provider == provider)
    }
}
