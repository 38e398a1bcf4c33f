//! Rule evaluation and weighted aggregation into a [`Scorecard`].
//!
//! Page-signal rules are evaluated once per scorable page, with their weight
//! scaled by the page category's applicability for the rule's dimension.
//! LLM rules (`llm_*` signals) are evaluated once per report against the
//! mean of the matching judgments.

use geolens_core::{
    CategoryScore, CellSignal, Dimension, GlobalScoreFormula, Judgment, PageSignals, Provenance,
    RuleResult, Scorecard, ScoringRule, ScoringRules, SignalKey,
};

use crate::threshold::lookup_threshold;
use crate::{round2, stable_mean};

/// Score pages and judgments against `rules`.
///
/// Cells without a judgment are ignored here; they affect metrics, not
/// rule scores. Re-scoring identical inputs yields an identical scorecard
/// regardless of cell order.
#[must_use]
pub fn score(pages: &[PageSignals], cells: &[CellSignal], rules: &ScoringRules) -> Scorecard {
    let (scorable, excluded): (Vec<&PageSignals>, Vec<&PageSignals>) = pages
        .iter()
        .partition(|p| !rules.is_page_excluded(p.category));

    let mut results: Vec<RuleResult> = Vec::new();
    for rule in &rules.rules {
        if rule.signal.is_llm() {
            results.extend(evaluate_llm_rule(rule, cells, rules.pass_mark));
        } else {
            for page in &scorable {
                results.extend(evaluate_page_rule(rule, page, rules));
            }
        }
    }

    let categories: Vec<CategoryScore> = Dimension::ALL
        .into_iter()
        .map(|dimension| aggregate_category(dimension, &results, rules))
        .collect();

    let global = global_score(&categories, &rules.global_score_formula);

    let issues = categories
        .iter()
        .flat_map(|c| c.issues.iter().cloned())
        .collect();
    let mut recommendations: Vec<String> = Vec::new();
    for rec in categories.iter().flat_map(|c| c.recommendations.iter()) {
        if !recommendations.contains(rec) {
            recommendations.push(rec.clone());
        }
    }

    tracing::debug!(
        global_score = global,
        pages_scored = scorable.len(),
        pages_excluded = excluded.len(),
        rule_results = results.len(),
        "scorecard computed"
    );

    Scorecard {
        global_score: global,
        categories,
        issues,
        recommendations,
        pages_scored: scorable.len(),
        pages_excluded: excluded.len(),
    }
}

/// `Σ(category score × dimension weight) / Σ(dimension weight)` over the
/// categories that applied at least one rule, rounded to two decimals.
///
/// A dimension without signal is left out rather than counted as 0, so the
/// remaining weights are renormalized. With every dimension scored this is the
/// plain weighted sum, since configured weights sum to 1.0.
#[must_use]
pub fn global_score(categories: &[CategoryScore], formula: &GlobalScoreFormula) -> f64 {
    let (weighted, total_weight) = categories
        .iter()
        .filter(|c| c.applied_rules > 0)
        .map(|c| (c.score, formula.weight(c.dimension)))
        .fold((0.0, 0.0), |(sum, weights), (score, weight)| {
            (sum + score * weight, weights + weight)
        });
    if total_weight <= 0.0 {
        return 0.0;
    }
    round2((weighted / total_weight).clamp(0.0, 100.0))
}

fn evaluate_page_rule(
    rule: &ScoringRule,
    page: &PageSignals,
    rules: &ScoringRules,
) -> Option<RuleResult> {
    let applicability = rules.applicability(page.category, rule.dimension);
    let multiplier = rules.multiplier(applicability)?;
    let value = page.value(rule.signal, &rules.brand_keywords)?;

    let Some(band) = lookup_threshold(&rule.thresholds, value) else {
        tracing::debug!(rule = %rule.id, value, "no threshold band matched, rule skipped");
        return None;
    };

    Some(RuleResult {
        rule_id: rule.id.clone(),
        dimension: rule.dimension,
        page_url: Some(page.url.clone()),
        value,
        score: band.score,
        weight: rule.weight * multiplier,
        passed: band.score >= rules.pass_mark,
        evidence: format!(
            "{}: {} = {value} in {} ({})",
            page.url,
            rule.signal,
            band.range_label(),
            band.description
        ),
    })
}

fn evaluate_llm_rule(rule: &ScoringRule, cells: &[CellSignal], pass_mark: f64) -> Option<RuleResult> {
    let judged: Vec<(f64, Provenance)> = cells
        .iter()
        .filter_map(|c| c.judgment.as_ref())
        .filter_map(|j| llm_value(&j.judgment, rule.signal).map(|v| (v, j.provenance)))
        .collect();
    let values: Vec<f64> = judged.iter().map(|(v, _)| *v).collect();
    let value = round2(stable_mean(&values)?);
    let fallbacks = judged
        .iter()
        .filter(|(_, p)| *p == Provenance::Fallback)
        .count();

    let (score, band_text) = if rule.thresholds.is_empty() {
        (value.clamp(0.0, 100.0), "judged score used directly".to_string())
    } else {
        let band = lookup_threshold(&rule.thresholds, value)?;
        (
            band.score,
            format!("{} ({})", band.range_label(), band.description),
        )
    };

    Some(RuleResult {
        rule_id: rule.id.clone(),
        dimension: rule.dimension,
        page_url: None,
        value,
        score,
        weight: rule.weight,
        passed: score >= pass_mark,
        evidence: format!(
            "{} averaged {value} over {} judgment(s), {fallbacks} fallback: {band_text}",
            rule.signal,
            values.len()
        ),
    })
}

fn llm_value(judgment: &Judgment, key: SignalKey) -> Option<f64> {
    match (judgment, key) {
        (Judgment::UnifiedKpi(j), SignalKey::LlmAuthority) => Some(j.scores.authority),
        (Judgment::UnifiedKpi(j), SignalKey::LlmFreshness) => Some(j.scores.freshness),
        (Judgment::UnifiedKpi(j), SignalKey::LlmStructure) => Some(j.scores.structure),
        (Judgment::UnifiedKpi(j), SignalKey::LlmBrandAlignment) => Some(j.scores.brand_alignment),
        (Judgment::Accuracy(j), SignalKey::LlmAccuracy) => Some(j.alignment_score),
        _ => None,
    }
}

fn aggregate_category(
    dimension: Dimension,
    results: &[RuleResult],
    rules: &ScoringRules,
) -> CategoryScore {
    let rule_results: Vec<RuleResult> = results
        .iter()
        .filter(|r| r.dimension == dimension)
        .cloned()
        .collect();
    let weight = rules.global_score_formula.weight(dimension);

    let total_weight: f64 = rule_results.iter().map(|r| r.weight).sum();
    if rule_results.is_empty() || total_weight <= 0.0 {
        return CategoryScore {
            dimension,
            score: 0.0,
            weight,
            applied_rules: 0,
            passed_rules: 0,
            rule_results: Vec::new(),
            issues: vec![format!(
                "{dimension}: no applicable rules, left out of the global score"
            )],
            recommendations: Vec::new(),
        };
    }

    let weighted: f64 = rule_results.iter().map(|r| r.score * r.weight).sum();
    let score = round2((weighted / total_weight).clamp(0.0, 100.0));

    let mut issues = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();
    for result in rule_results.iter().filter(|r| !r.passed) {
        issues.push(format!("{}: {}", result.rule_id, result.evidence));
        let recommendation = rules
            .rules
            .iter()
            .find(|r| r.id == result.rule_id)
            .map(|r| r.recommendation.trim())
            .filter(|r| !r.is_empty());
        if let Some(rec) = recommendation {
            if !recommendations.iter().any(|existing| existing == rec) {
                recommendations.push(rec.to_string());
            }
        }
    }

    CategoryScore {
        dimension,
        score,
        weight,
        applied_rules: rule_results.len(),
        passed_rules: rule_results.iter().filter(|r| r.passed).count(),
        rule_results,
        issues,
        recommendations,
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
