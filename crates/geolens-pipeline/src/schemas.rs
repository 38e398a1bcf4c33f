use geolens_core::PipelineType;
use geolens_providers::OutputSchema;

/// The JSON shape each pipeline's answer must take.
#[must_use]
pub fn schema_for(pipeline: PipelineType) -> OutputSchema {
    match pipeline {
        PipelineType::Spontaneous => OutputSchema {
            name: "spontaneous",
            shape: r#"{"brands_mentioned": ["string, in the order named"]}"#,
        },
        PipelineType::Sentiment => OutputSchema {
            name: "sentiment",
            shape: r#"{"valence": "number between -1 and 1", "status": "positive | neutral | negative | mixed", "keywords": ["string"]}"#,
        },
        PipelineType::Comparison => OutputSchema {
            name: "comparison",
            shape: r#"{"winner": "string, the recommended brand", "differentiators": ["string"]}"#,
        },
        PipelineType::Accuracy => OutputSchema {
            name: "accuracy",
            shape: r#"{"alignment_score": "number between 0 and 100", "matched_attributes": ["string"], "missing_attributes": ["string"], "inaccuracies": ["string"]}"#,
        },
        PipelineType::BrandBattle => OutputSchema {
            name: "brand_battle",
            shape: r#"{"winner": "string", "brand_score": "number between 0 and 100", "competitor_score": "number between 0 and 100", "reasoning": "string"}"#,
        },
        PipelineType::UnifiedKpi => OutputSchema {
            name: "unified_kpi",
            shape: r#"{"scores": {"authority": "number 0-100", "freshness": "number 0-100", "structure": "number 0-100", "brand_alignment": "number 0-100"}, "details": {"string": "string"}, "issues": ["string"], "explanation": "string", "has_date_signals": "boolean"}"#,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pipeline_has_a_named_schema() {
        for pipeline in PipelineType::ALL {
            assert_eq!(schema_for(pipeline).name, pipeline.as_str());
        }
    }
}
