//! Current- vs prior-period comparison over stored reports.
//!
//! Deltas are percentage points (`round(current - prior)`), never relative
//! change, which is unstable near zero.

use std::collections::BTreeSet;

use geolens_core::Report;
use serde::{Deserialize, Serialize};

use crate::round2;

/// Which report value a variation tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    MentionRate,
    GlobalScore,
    SentimentScore,
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mention_rate" | "visibility" => Ok(Metric::MentionRate),
            "global_score" => Ok(Metric::GlobalScore),
            "sentiment_score" | "sentiment" => Ok(Metric::SentimentScore),
            other => Err(format!("unknown metric '{other}'")),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Metric::MentionRate => "mention_rate",
            Metric::GlobalScore => "global_score",
            Metric::SentimentScore => "sentiment_score",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationResult {
    pub entity: String,
    pub current_average: f64,
    pub prior_average: f64,
    /// Whole percentage points.
    pub delta: f64,
}

#[allow(clippy::cast_precision_loss)]
fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variation(entity: &str, current: &[f64], prior: &[f64]) -> VariationResult {
    let current_average = round2(average(current));
    let prior_average = round2(average(prior));
    VariationResult {
        entity: entity.to_string(),
        current_average,
        prior_average,
        delta: (current_average - prior_average).round(),
    }
}

/// The metric's value for `entity` in one report.
///
/// The brand supports every metric. Competitors only carry a mention rate;
/// a competitor absent from the report, or asked for another metric,
/// contributes 0.
fn entity_value(report: &Report, entity: &str, metric: Metric) -> f64 {
    if report.brand_name.eq_ignore_ascii_case(entity) {
        return match metric {
            Metric::MentionRate => report.brand_metrics.mention_rate,
            Metric::GlobalScore => report.scorecard.global_score,
            Metric::SentimentScore => report.brand_metrics.sentiment_score,
        };
    }
    match metric {
        Metric::MentionRate => report.competitor(entity).map_or(0.0, |c| c.mention_rate),
        Metric::GlobalScore | Metric::SentimentScore => 0.0,
    }
}

/// Average `metric` for `entity` over each period and the delta between them.
///
/// An empty period averages to 0.
#[must_use]
pub fn compute_variation(
    entity: &str,
    current: &[Report],
    prior: &[Report],
    metric: Metric,
) -> VariationResult {
    let values = |reports: &[Report]| -> Vec<f64> {
        reports
            .iter()
            .map(|r| entity_value(r, entity, metric))
            .collect()
    };
    variation(entity, &values(current), &values(prior))
}

/// Variations for the brand followed by every competitor seen in either
/// period (sorted by name). Competitors are only included for
/// [`Metric::MentionRate`].
#[must_use]
pub fn compute_all_variations(
    brand_name: &str,
    current: &[Report],
    prior: &[Report],
    metric: Metric,
) -> Vec<VariationResult> {
    let mut results = vec![compute_variation(brand_name, current, prior, metric)];
    if metric != Metric::MentionRate {
        return results;
    }

    let competitors: BTreeSet<String> = current
        .iter()
        .chain(prior)
        .flat_map(|r| r.competitor_metrics.iter().map(|c| c.name.clone()))
        .filter(|name| !name.eq_ignore_ascii_case(brand_name))
        .collect();
    results.extend(
        competitors
            .iter()
            .map(|name| compute_variation(name, current, prior, metric)),
    );
    results
}

/// Brand variations per provider, for every provider seen in either period.
///
/// A provider absent from a report contributes 0 for that report.
#[must_use]
pub fn compute_model_variations(
    current: &[Report],
    prior: &[Report],
    metric: Metric,
) -> Vec<VariationResult> {
    let providers: BTreeSet<&str> = current
        .iter()
        .chain(prior)
        .flat_map(|r| r.model_metrics.iter().map(|m| m.provider.as_str()))
        .collect();

    let model_value = |report: &Report, provider: &str| -> f64 {
        report.model(provider).map_or(0.0, |m| match metric {
            Metric::MentionRate => m.mention_rate,
            Metric::SentimentScore => m.sentiment_score,
            Metric::GlobalScore => report.scorecard.global_score,
        })
    };

    providers
        .into_iter()
        .map(|provider| {
            let current: Vec<f64> = current.iter().map(|r| model_value(r, provider)).collect();
            let prior: Vec<f64> = prior.iter().map(|r| model_value(r, provider)).collect();
            variation(provider, &current, &prior)
        })
        .collect()
}

#[cfg(test)]
#[path = "variation_test.rs"]
mod tests;
