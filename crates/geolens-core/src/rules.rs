//! Versioned scoring-rules document.
//!
//! Loaded once per scoring run from YAML and validated here, at load time:
//! global weights must sum to 1.0 and every threshold table must be
//! exhaustive and gap-free. The scoring engine assumes a validated document.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::signals::{PageCategory, SignalKey};
use crate::ConfigError;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

static BUILTIN_RULES: &str = include_str!("../../../config/scoring_rules.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Authority,
    Freshness,
    Structure,
    BrandAlignment,
    SnippetExtractability,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Authority,
        Dimension::Freshness,
        Dimension::Structure,
        Dimension::BrandAlignment,
        Dimension::SnippetExtractability,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Authority => "authority",
            Dimension::Freshness => "freshness",
            Dimension::Structure => "structure",
            Dimension::BrandAlignment => "brand_alignment",
            Dimension::SnippetExtractability => "snippet_extractability",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One band of a threshold table: the half-open range `[min, max)`.
///
/// `None` bounds are unbounded, so a table can cover every real number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringThreshold {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub score: f64,
    pub description: String,
}

impl ScoringThreshold {
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value < max)
    }

    /// Human-readable range, e.g. `[5, 10)` or `[30, ∞)`.
    #[must_use]
    pub fn range_label(&self) -> String {
        let min = self.min.map_or_else(|| "-∞".to_string(), |v| v.to_string());
        let max = self.max.map_or_else(|| "∞".to_string(), |v| v.to_string());
        format!("[{min}, {max})")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    Full,
    Partial,
    Limited,
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApplicabilityMultipliers {
    pub full: f64,
    pub partial: f64,
    pub limited: f64,
}

impl Default for ApplicabilityMultipliers {
    fn default() -> Self {
        Self {
            full: 1.0,
            partial: 0.6,
            limited: 0.3,
        }
    }
}

/// Which dimensions apply to a page category, and how strongly.
///
/// Dimensions not listed apply in full. `excluded: true` removes the whole
/// page from scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageApplicability {
    pub category: PageCategory,
    #[serde(default)]
    pub excluded: bool,
    #[serde(default)]
    pub dimensions: BTreeMap<Dimension, Applicability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub id: String,
    pub dimension: Dimension,
    pub signal: SignalKey,
    pub weight: f64,
    /// Required for page signals. May be empty for `llm_*` signals, in which
    /// case the judged 0–100 value is used as the score.
    #[serde(default)]
    pub thresholds: Vec<ScoringThreshold>,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalScoreFormula {
    pub weights: BTreeMap<Dimension, f64>,
}

impl GlobalScoreFormula {
    #[must_use]
    pub fn weight(&self, dimension: Dimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }
}

fn default_pass_mark() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub version: String,
    pub global_score_formula: GlobalScoreFormula,
    #[serde(default)]
    pub multipliers: ApplicabilityMultipliers,
    #[serde(default)]
    pub page_applicability: Vec<PageApplicability>,
    /// A rule result at or above this score counts as passed; below it the
    /// rule contributes an issue and its recommendation.
    #[serde(default = "default_pass_mark")]
    pub pass_mark: f64,
    #[serde(default)]
    pub brand_keywords: Vec<String>,
    pub rules: Vec<ScoringRule>,
}

impl ScoringRules {
    fn page_entry(&self, category: PageCategory) -> Option<&PageApplicability> {
        self.page_applicability
            .iter()
            .find(|p| p.category == category)
    }

    #[must_use]
    pub fn is_page_excluded(&self, category: PageCategory) -> bool {
        self.page_entry(category).is_some_and(|p| p.excluded)
    }

    #[must_use]
    pub fn applicability(&self, category: PageCategory, dimension: Dimension) -> Applicability {
        match self.page_entry(category) {
            Some(p) if p.excluded => Applicability::Excluded,
            Some(p) => p
                .dimensions
                .get(&dimension)
                .copied()
                .unwrap_or(Applicability::Full),
            None => Applicability::Full,
        }
    }

    /// Weight multiplier for an applicability level; `None` when excluded.
    #[must_use]
    pub fn multiplier(&self, applicability: Applicability) -> Option<f64> {
        match applicability {
            Applicability::Full => Some(self.multipliers.full),
            Applicability::Partial => Some(self.multipliers.partial),
            Applicability::Limited => Some(self.multipliers.limited),
            Applicability::Excluded => None,
        }
    }

    /// Validate the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(invalid("rules version must be non-empty"));
        }

        validate_weights(&self.global_score_formula)?;

        for (name, m) in [
            ("full", self.multipliers.full),
            ("partial", self.multipliers.partial),
            ("limited", self.multipliers.limited),
        ] {
            if !(m > 0.0 && m <= 1.0) {
                return Err(invalid(format!(
                    "applicability multiplier '{name}' must be in (0, 1]; got {m}"
                )));
            }
        }

        if !(0.0..=100.0).contains(&self.pass_mark) {
            return Err(invalid(format!(
                "pass_mark must be in [0, 100]; got {}",
                self.pass_mark
            )));
        }

        let mut seen_categories = HashSet::new();
        for entry in &self.page_applicability {
            if !seen_categories.insert(entry.category) {
                return Err(invalid(format!(
                    "duplicate page_applicability entry for '{}'",
                    entry.category
                )));
            }
        }

        if self.rules.is_empty() {
            return Err(invalid("at least one scoring rule is required"));
        }

        let mut seen_ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(invalid("rule id must be non-empty"));
            }
            if !seen_ids.insert(rule.id.as_str()) {
                return Err(invalid(format!("duplicate rule id: '{}'", rule.id)));
            }
            if !(rule.weight.is_finite() && rule.weight > 0.0) {
                return Err(invalid(format!(
                    "rule '{}' must have a positive weight; got {}",
                    rule.id, rule.weight
                )));
            }
            if rule.thresholds.is_empty() {
                if !rule.signal.is_llm() {
                    return Err(invalid(format!(
                        "rule '{}' reads page signal '{}' and needs a threshold table",
                        rule.id, rule.signal
                    )));
                }
            } else {
                validate_threshold_table(&rule.id, &rule.thresholds)?;
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_weights(formula: &GlobalScoreFormula) -> Result<(), ConfigError> {
    for (dimension, weight) in &formula.weights {
        if !(weight.is_finite() && (0.0..=1.0).contains(weight)) {
            return Err(invalid(format!(
                "weight for '{dimension}' must be in [0, 1]; got {weight}"
            )));
        }
    }
    let sum: f64 = formula.weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(invalid(format!(
            "global score weights must sum to 1.0; got {sum}"
        )));
    }
    Ok(())
}

/// Check that a threshold table maps every real number to exactly one band.
///
/// Bands must be declared in ascending order, the first unbounded below, the
/// last unbounded above, and each band's `max` equal to the next band's `min`.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] naming the rule and the offending band.
pub fn validate_threshold_table(
    rule_id: &str,
    table: &[ScoringThreshold],
) -> Result<(), ConfigError> {
    let (Some(first), Some(last)) = (table.first(), table.last()) else {
        return Err(invalid(format!("rule '{rule_id}' has an empty threshold table")));
    };

    if first.min.is_some() {
        return Err(invalid(format!(
            "rule '{rule_id}': first threshold must have no lower bound"
        )));
    }
    if last.max.is_some() {
        return Err(invalid(format!(
            "rule '{rule_id}': last threshold must have no upper bound"
        )));
    }

    for (i, t) in table.iter().enumerate() {
        if !(t.score.is_finite() && (0.0..=100.0).contains(&t.score)) {
            return Err(invalid(format!(
                "rule '{rule_id}': threshold {i} score {} is outside [0, 100]",
                t.score
            )));
        }
        if t.description.trim().is_empty() {
            return Err(invalid(format!(
                "rule '{rule_id}': threshold {i} needs a description"
            )));
        }
        if let (Some(min), Some(max)) = (t.min, t.max) {
            if min >= max {
                return Err(invalid(format!(
                    "rule '{rule_id}': threshold {i} range {} is empty",
                    t.range_label()
                )));
            }
        }
    }

    for (i, pair) in table.windows(2).enumerate() {
        match (pair[0].max, pair[1].min) {
            (Some(upper), Some(lower)) if (upper - lower).abs() < f64::EPSILON => {}
            _ => {
                return Err(invalid(format!(
                    "rule '{rule_id}': thresholds {i} {} and {} {} must be contiguous",
                    pair[0].range_label(),
                    i + 1,
                    pair[1].range_label()
                )));
            }
        }
    }

    Ok(())
}

/// Parse and validate a rules document from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::FileParse`] on malformed YAML or
/// [`ConfigError::Validation`] if the document is inconsistent.
pub fn parse_rules(origin: &str, yaml: &str) -> Result<ScoringRules, ConfigError> {
    let rules: ScoringRules = serde_yaml::from_str(yaml).map_err(|e| ConfigError::FileParse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    rules.validate()?;
    Ok(rules)
}

/// Load and validate the scoring rules from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_rules(path: &Path) -> Result<ScoringRules, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_rules(&path.display().to_string(), &content)
}

/// The rules bundled with the binary (`config/scoring_rules.yaml`).
///
/// # Errors
///
/// Returns `ConfigError` only if the bundled file is itself invalid.
pub fn builtin_rules() -> Result<ScoringRules, ConfigError> {
    parse_rules("<builtin>", BUILTIN_RULES)
}

#[cfg(test)]
#[path = "rules_test.rs"]
mod tests;
