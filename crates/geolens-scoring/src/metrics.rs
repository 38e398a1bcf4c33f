//! Brand, per-model and competitor metrics derived from batch cells.
//!
//! A cell without a judgment (failed or cancelled call) counts as "no
//! signal": it contributes its pipeline's fallback values, so every rate is
//! taken over attempted cells rather than successful ones.

use std::collections::BTreeMap;

use geolens_core::judgment::FALLBACK_SCORE;
use geolens_core::{
    refers_to, BrandMetrics, CellSignal, CompetitorMetrics, Judgment, ModelMetrics, PipelineType,
    StructuredJudgment,
};

use crate::{round2, stable_mean};

fn judgment_or_fallback(cell: &CellSignal) -> Judgment {
    cell.judgment
        .as_ref()
        .map_or_else(
            || StructuredJudgment::fallback(cell.pipeline),
            Clone::clone,
        )
        .judgment
}

fn cells_of(cells: &[&CellSignal], pipeline: PipelineType) -> Vec<Judgment> {
    cells
        .iter()
        .filter(|c| c.pipeline == pipeline)
        .map(|c| judgment_or_fallback(c))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(hits as f64 / total as f64 * 100.0)
    }
}

fn metrics_for(cells: &[&CellSignal], brand_name: &str) -> BrandMetrics {
    let spontaneous = cells_of(cells, PipelineType::Spontaneous);
    let mentioned = spontaneous
        .iter()
        .filter(|j| matches!(j, Judgment::Spontaneous(s) if s.brand_mentioned))
        .count();

    // valence [-1, 1] mapped onto [0, 100]
    let sentiments: Vec<f64> = cells_of(cells, PipelineType::Sentiment)
        .iter()
        .filter_map(|j| match j {
            Judgment::Sentiment(s) => Some((s.valence.clamp(-1.0, 1.0) + 1.0) * 50.0),
            _ => None,
        })
        .collect();

    let alignments: Vec<f64> = cells_of(cells, PipelineType::Accuracy)
        .iter()
        .filter_map(|j| match j {
            Judgment::Accuracy(a) => Some(a.alignment_score),
            _ => None,
        })
        .collect();

    let battles = cells_of(cells, PipelineType::BrandBattle);
    let won = battles
        .iter()
        .filter(|j| matches!(j, Judgment::BrandBattle(b) if refers_to(&b.winner, brand_name)))
        .count();

    BrandMetrics {
        mention_rate: rate(mentioned, spontaneous.len()),
        sentiment_score: round2(stable_mean(&sentiments).unwrap_or(FALLBACK_SCORE)),
        alignment_score: round2(stable_mean(&alignments).unwrap_or(FALLBACK_SCORE)),
        battle_win_rate: rate(won, battles.len()),
    }
}

/// Brand-level metrics across every model.
///
/// With no cells for a pipeline, rates are 0 and 0–100 scores are neutral (50).
#[must_use]
pub fn brand_metrics(cells: &[CellSignal], brand_name: &str) -> BrandMetrics {
    let refs: Vec<&CellSignal> = cells.iter().collect();
    metrics_for(&refs, brand_name)
}

/// Brand metrics split by provider, ordered by provider name.
#[must_use]
pub fn model_metrics(cells: &[CellSignal], brand_name: &str) -> Vec<ModelMetrics> {
    let mut by_provider: BTreeMap<&str, Vec<&CellSignal>> = BTreeMap::new();
    for cell in cells {
        by_provider.entry(cell.provider.as_str()).or_default().push(cell);
    }

    by_provider
        .into_iter()
        .map(|(provider, group)| {
            let metrics = metrics_for(&group, brand_name);
            let model = group
                .iter()
                .find(|c| c.judgment.is_some())
                .or_else(|| group.first())
                .map(|c| c.model.clone())
                .unwrap_or_default();
            ModelMetrics {
                provider: provider.to_string(),
                model,
                mention_rate: metrics.mention_rate,
                sentiment_score: metrics.sentiment_score,
                alignment_score: metrics.alignment_score,
                cells_attempted: group.len(),
                cells_with_signal: group.iter().filter(|c| c.judgment.is_some()).count(),
            }
        })
        .collect()
}

/// Mention rate and head-to-head record for each tracked competitor, in
/// project order.
#[must_use]
pub fn competitor_metrics(cells: &[CellSignal], competitors: &[String]) -> Vec<CompetitorMetrics> {
    let refs: Vec<&CellSignal> = cells.iter().collect();
    let spontaneous = cells_of(&refs, PipelineType::Spontaneous);

    competitors
        .iter()
        .map(|name| {
            let mentioned = spontaneous
                .iter()
                .filter(|j| {
                    matches!(j, Judgment::Spontaneous(s)
                        if s.brands_mentioned.iter().any(|b| refers_to(b, name)))
                })
                .count();

            let battles: Vec<Judgment> = cells
                .iter()
                .filter(|c| c.pipeline == PipelineType::BrandBattle)
                .filter(|c| c.subject.as_deref().is_some_and(|s| refers_to(s, name)))
                .map(judgment_or_fallback)
                .collect();
            let battles_won = battles
                .iter()
                .filter(|j| matches!(j, Judgment::BrandBattle(b) if refers_to(&b.winner, name)))
                .count();

            CompetitorMetrics {
                name: name.clone(),
                mention_rate: rate(mentioned, spontaneous.len()),
                battles_won,
                battles_total: battles.len(),
            }
        })
        .collect()
}
