//! Structured judgments: the machine-usable distillation of one model answer.
//!
//! Each pipeline type has its own body shape and a documented fallback value.
//! The fallback is what the scoring engine sees when a response could not be
//! parsed or repaired, so scoring never handles a missing judgment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Neutral score used by every 0–100 fallback field.
pub const FALLBACK_SCORE: f64 = 50.0;

/// Issue text attached to fallback judgments.
pub const FALLBACK_ISSUE: &str = "analysis failed: fallback used";

/// Whether `candidate`, a brand name as a model wrote it, refers to `name`.
///
/// Case-insensitive and trimmed; "ACME Sparkling Water" refers to
/// "Acme Sparkling". Used for mentions and battle winners alike.
#[must_use]
pub fn refers_to(candidate: &str, name: &str) -> bool {
    let candidate = candidate.trim().to_lowercase();
    let name = name.trim().to_lowercase();
    !candidate.is_empty() && !name.is_empty() && candidate.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineType {
    Spontaneous,
    Sentiment,
    Comparison,
    Accuracy,
    BrandBattle,
    UnifiedKpi,
}

impl PipelineType {
    pub const ALL: [PipelineType; 6] = [
        PipelineType::Spontaneous,
        PipelineType::Sentiment,
        PipelineType::Comparison,
        PipelineType::Accuracy,
        PipelineType::BrandBattle,
        PipelineType::UnifiedKpi,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineType::Spontaneous => "spontaneous",
            PipelineType::Sentiment => "sentiment",
            PipelineType::Comparison => "comparison",
            PipelineType::Accuracy => "accuracy",
            PipelineType::BrandBattle => "brand_battle",
            PipelineType::UnifiedKpi => "unified_kpi",
        }
    }
}

impl std::fmt::Display for PipelineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a judgment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Extracted,
    Repaired,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentStatus {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentJudgment {
    /// Overall tone in `[-1.0, 1.0]`.
    pub valence: f64,
    pub status: SentimentStatus,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonJudgment {
    pub winner: String,
    #[serde(default)]
    pub differentiators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpontaneousJudgment {
    #[serde(default, alias = "brandMentioned")]
    pub brand_mentioned: bool,
    /// 1-based rank of the brand in the answer, if it was listed.
    #[serde(default, alias = "brandPosition")]
    pub brand_position: Option<u32>,
    /// Brands named in the answer, in the order given.
    #[serde(alias = "brandsMentioned")]
    pub brands_mentioned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyJudgment {
    #[serde(alias = "alignmentScore")]
    pub alignment_score: f64,
    #[serde(default, alias = "matchedAttributes")]
    pub matched_attributes: Vec<String>,
    #[serde(default, alias = "missingAttributes")]
    pub missing_attributes: Vec<String>,
    #[serde(default)]
    pub inaccuracies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandBattleJudgment {
    pub winner: String,
    #[serde(alias = "brandScore")]
    pub brand_score: f64,
    #[serde(alias = "competitorScore")]
    pub competitor_score: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiScores {
    pub authority: f64,
    pub freshness: f64,
    pub structure: f64,
    #[serde(alias = "brandAlignment")]
    pub brand_alignment: f64,
}

impl KpiScores {
    #[must_use]
    pub fn uniform(score: f64) -> Self {
        Self {
            authority: score,
            freshness: score,
            structure: score,
            brand_alignment: score,
        }
    }

    fn all(&self) -> [(&'static str, f64); 4] {
        [
            ("authority", self.authority),
            ("freshness", self.freshness),
            ("structure", self.structure),
            ("brand_alignment", self.brand_alignment),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedKpiJudgment {
    pub scores: KpiScores,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, alias = "hasDateSignals")]
    pub has_date_signals: bool,
}

/// A pipeline-specific judgment body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pipeline", content = "body", rename_all = "snake_case")]
pub enum Judgment {
    Spontaneous(SpontaneousJudgment),
    Sentiment(SentimentJudgment),
    Comparison(ComparisonJudgment),
    Accuracy(AccuracyJudgment),
    BrandBattle(BrandBattleJudgment),
    UnifiedKpi(UnifiedKpiJudgment),
}

impl Judgment {
    #[must_use]
    pub fn pipeline(&self) -> PipelineType {
        match self {
            Judgment::Spontaneous(_) => PipelineType::Spontaneous,
            Judgment::Sentiment(_) => PipelineType::Sentiment,
            Judgment::Comparison(_) => PipelineType::Comparison,
            Judgment::Accuracy(_) => PipelineType::Accuracy,
            Judgment::BrandBattle(_) => PipelineType::BrandBattle,
            Judgment::UnifiedKpi(_) => PipelineType::UnifiedKpi,
        }
    }

    /// The documented default for a pipeline.
    ///
    /// | Pipeline     | Fallback                                              |
    /// |--------------|-------------------------------------------------------|
    /// | spontaneous  | brand not mentioned, no brands listed                 |
    /// | sentiment    | valence 0.0, neutral, no keywords                     |
    /// | comparison   | no winner, no differentiators                         |
    /// | accuracy     | alignment 50, no attributes                           |
    /// | brand battle | no winner, both sides 50                              |
    /// | unified KPI  | all four scores 50, no date signals, one failure issue |
    #[must_use]
    pub fn fallback(pipeline: PipelineType) -> Self {
        match pipeline {
            PipelineType::Spontaneous => Judgment::Spontaneous(SpontaneousJudgment {
                brand_mentioned: false,
                brand_position: None,
                brands_mentioned: Vec::new(),
            }),
            PipelineType::Sentiment => Judgment::Sentiment(SentimentJudgment {
                valence: 0.0,
                status: SentimentStatus::Neutral,
                keywords: Vec::new(),
            }),
            PipelineType::Comparison => Judgment::Comparison(ComparisonJudgment {
                winner: String::new(),
                differentiators: Vec::new(),
            }),
            PipelineType::Accuracy => Judgment::Accuracy(AccuracyJudgment {
                alignment_score: FALLBACK_SCORE,
                matched_attributes: Vec::new(),
                missing_attributes: Vec::new(),
                inaccuracies: Vec::new(),
            }),
            PipelineType::BrandBattle => Judgment::BrandBattle(BrandBattleJudgment {
                winner: String::new(),
                brand_score: FALLBACK_SCORE,
                competitor_score: FALLBACK_SCORE,
                reasoning: FALLBACK_ISSUE.to_string(),
            }),
            PipelineType::UnifiedKpi => Judgment::UnifiedKpi(UnifiedKpiJudgment {
                scores: KpiScores::uniform(FALLBACK_SCORE),
                details: BTreeMap::new(),
                issues: vec![FALLBACK_ISSUE.to_string()],
                explanation: FALLBACK_ISSUE.to_string(),
                has_date_signals: false,
            }),
        }
    }

    /// Check value ranges that the JSON shape alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first out-of-range field.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Judgment::Spontaneous(j) => {
                if j.brand_position == Some(0) {
                    return Err("brand_position is 1-based; got 0".to_string());
                }
                Ok(())
            }
            Judgment::Sentiment(j) => check_range("valence", j.valence, -1.0, 1.0),
            Judgment::Comparison(_) => Ok(()),
            Judgment::Accuracy(j) => check_range("alignment_score", j.alignment_score, 0.0, 100.0),
            Judgment::BrandBattle(j) => {
                check_range("brand_score", j.brand_score, 0.0, 100.0)?;
                check_range("competitor_score", j.competitor_score, 0.0, 100.0)
            }
            Judgment::UnifiedKpi(j) => j
                .scores
                .all()
                .iter()
                .try_for_each(|(name, v)| check_range(name, *v, 0.0, 100.0)),
        }
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} = {value} is outside [{min}, {max}]"))
    }
}

/// A judgment plus where it came from. Never absent for a successful cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredJudgment {
    pub provenance: Provenance,
    pub judgment: Judgment,
}

impl StructuredJudgment {
    #[must_use]
    pub fn fallback(pipeline: PipelineType) -> Self {
        Self {
            provenance: Provenance::Fallback,
            judgment: Judgment::fallback(pipeline),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> PipelineType {
        self.judgment.pipeline()
    }
}

/// One batch cell reduced to what scoring needs.
///
/// `judgment` is `None` when the provider call failed or was cancelled; the
/// scoring engine then treats the cell as "no signal".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSignal {
    pub provider: String,
    pub model: String,
    pub pipeline: PipelineType,
    /// Competitor name for comparison/battle prompts, page URL for unified KPI.
    pub subject: Option<String>,
    pub judgment: Option<StructuredJudgment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_names_match_loosely() {
        assert!(refers_to("ACME Sparkling Water", "Acme Sparkling"));
        assert!(refers_to(" acme ", "Acme"));
        assert!(!refers_to("Fizzco", "Acme"));
        assert!(!refers_to("", "Acme"));
        assert!(!refers_to("Acme", ""));
    }

    #[test]
    fn unified_kpi_fallback_scores_are_fifty() {
        let fallback = StructuredJudgment::fallback(PipelineType::UnifiedKpi);
        assert_eq!(fallback.provenance, Provenance::Fallback);
        match fallback.judgment {
            Judgment::UnifiedKpi(kpi) => {
                assert_eq!(kpi.scores, KpiScores::uniform(50.0));
                assert!(!kpi.has_date_signals);
                assert_eq!(kpi.issues, vec![FALLBACK_ISSUE.to_string()]);
            }
            other => panic!("expected unified KPI fallback, got {other:?}"),
        }
    }

    #[test]
    fn every_fallback_matches_its_pipeline_and_validates() {
        for pipeline in PipelineType::ALL {
            let fallback = Judgment::fallback(pipeline);
            assert_eq!(fallback.pipeline(), pipeline);
            assert!(fallback.validate().is_ok(), "{pipeline} fallback invalid");
        }
    }

    #[test]
    fn validate_rejects_out_of_range_valence() {
        let j = Judgment::Sentiment(SentimentJudgment {
            valence: 1.5,
            status: SentimentStatus::Positive,
            keywords: Vec::new(),
        });
        assert!(j.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan_kpi_score() {
        let mut scores = KpiScores::uniform(70.0);
        scores.freshness = f64::NAN;
        let j = Judgment::UnifiedKpi(UnifiedKpiJudgment {
            scores,
            details: BTreeMap::new(),
            issues: Vec::new(),
            explanation: String::new(),
            has_date_signals: true,
        });
        let err = j.validate().unwrap_err();
        assert!(err.contains("freshness"), "unexpected error: {err}");
    }

    #[test]
    fn kpi_scores_accept_camel_case_alias() {
        let scores: KpiScores = serde_json::from_str(
            r#"{"authority": 80, "freshness": 60, "structure": 70, "brandAlignment": 90}"#,
        )
        .unwrap();
        assert_eq!(scores.brand_alignment, 90.0);
    }

    #[test]
    fn judgment_serializes_with_pipeline_tag() {
        let value = serde_json::to_value(Judgment::fallback(PipelineType::Sentiment)).unwrap();
        assert_eq!(value["pipeline"], "sentiment");
        assert_eq!(value["body"]["status"], "neutral");
    }
}
