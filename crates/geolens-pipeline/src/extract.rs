//! Turns a provider's free-text answer into a structured judgment.
//!
//! The path is parse, then at most one repair round-trip, then the
//! pipeline's fallback. Extraction never fails: scoring always receives a
//! judgment, and its provenance says how much to trust it.

use geolens_core::{
    refers_to, AccuracyJudgment, BrandBattleJudgment, ComparisonJudgment, Judgment, PipelineType,
    Provenance, SentimentJudgment, SpontaneousJudgment, StructuredJudgment, TokenUsage,
    UnifiedKpiJudgment,
};
use geolens_providers::{parse_json_block, CallOptions, ProviderAdapter, RawResponse};

use crate::schemas::schema_for;

/// The adapter and options to use for the single repair attempt.
#[derive(Debug, Clone, Copy)]
pub struct Repair<'a> {
    pub adapter: &'a ProviderAdapter,
    pub options: &'a CallOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub judgment: StructuredJudgment,
    /// Tokens spent on a repair call, if one succeeded at the HTTP level.
    pub repair_usage: Option<TokenUsage>,
    /// A repair call was made and the provider returned an error.
    pub repair_failed: bool,
}

/// Decode and validate a judgment for `pipeline` from free text.
///
/// # Errors
///
/// Returns a reason when no JSON block decodes into the pipeline's shape or
/// the decoded values are out of range.
pub fn parse_judgment(pipeline: PipelineType, text: &str) -> Result<Judgment, String> {
    let judgment = match pipeline {
        PipelineType::Spontaneous => {
            Judgment::Spontaneous(parse_json_block::<SpontaneousJudgment>(text)?)
        }
        PipelineType::Sentiment => Judgment::Sentiment(parse_json_block::<SentimentJudgment>(text)?),
        PipelineType::Comparison => {
            Judgment::Comparison(parse_json_block::<ComparisonJudgment>(text)?)
        }
        PipelineType::Accuracy => Judgment::Accuracy(parse_json_block::<AccuracyJudgment>(text)?),
        PipelineType::BrandBattle => {
            Judgment::BrandBattle(parse_json_block::<BrandBattleJudgment>(text)?)
        }
        PipelineType::UnifiedKpi => {
            Judgment::UnifiedKpi(parse_json_block::<UnifiedKpiJudgment>(text)?)
        }
    };
    judgment.validate()?;
    Ok(judgment)
}

/// Extract a structured judgment from `raw`.
///
/// With `repair` set, a malformed answer is sent back to the same adapter
/// once for correction. Anything still unusable becomes the pipeline's
/// documented fallback.
pub async fn extract(
    raw: &RawResponse,
    pipeline: PipelineType,
    repair: Option<Repair<'_>>,
) -> Extraction {
    let reason = match parse_judgment(pipeline, &raw.text) {
        Ok(judgment) => {
            return Extraction {
                judgment: StructuredJudgment {
                    provenance: Provenance::Extracted,
                    judgment,
                },
                repair_usage: None,
                repair_failed: false,
            }
        }
        Err(reason) => reason,
    };

    let Some(repair) = repair else {
        tracing::warn!(
            provider = %raw.provider,
            prompt_id = raw.prompt_id.as_deref().unwrap_or("-"),
            %pipeline,
            %reason,
            "unparseable answer and no repair available, using fallback"
        );
        return fallback(pipeline, None);
    };

    tracing::debug!(
        provider = %raw.provider,
        prompt_id = raw.prompt_id.as_deref().unwrap_or("-"),
        %pipeline,
        %reason,
        "answer malformed, attempting repair"
    );

    let schema = schema_for(pipeline);
    let repaired = match repair.adapter.repair(&raw.text, &schema, repair.options).await {
        Ok(repaired) => repaired,
        Err(e) => {
            tracing::warn!(
                provider = %raw.provider,
                %pipeline,
                error = %e,
                "repair call failed, using fallback"
            );
            return Extraction {
                repair_failed: true,
                ..fallback(pipeline, None)
            };
        }
    };

    match parse_judgment(pipeline, &repaired.text) {
        Ok(judgment) => Extraction {
            judgment: StructuredJudgment {
                provenance: Provenance::Repaired,
                judgment,
            },
            repair_usage: Some(repaired.usage),
            repair_failed: false,
        },
        Err(reason) => {
            tracing::warn!(
                provider = %raw.provider,
                %pipeline,
                %reason,
                "repaired answer still malformed, using fallback"
            );
            fallback(pipeline, Some(repaired.usage))
        }
    }
}

fn fallback(pipeline: PipelineType, repair_usage: Option<TokenUsage>) -> Extraction {
    Extraction {
        judgment: StructuredJudgment::fallback(pipeline),
        repair_usage,
        repair_failed: false,
    }
}

/// Recompute whether and where `brand` appears in a spontaneous answer's
/// brand list. Models are asked only to list brands; mention and rank are
/// derived here so every provider is judged the same way.
pub fn normalize_for_brand(judgment: &mut StructuredJudgment, brand: &str) {
    let Judgment::Spontaneous(spontaneous) = &mut judgment.judgment else {
        return;
    };
    let position = spontaneous
        .brands_mentioned
        .iter()
        .position(|name| refers_to(name, brand));
    spontaneous.brand_mentioned = position.is_some();
    spontaneous.brand_position = position.and_then(|i| u32::try_from(i + 1).ok());
}
