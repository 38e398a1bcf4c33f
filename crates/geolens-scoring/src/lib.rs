//! Turns page signals and structured judgments into scored reports, and
//! stored reports into period-over-period variations.
//!
//! Everything here is a pure function of its inputs.

pub mod engine;
pub mod metrics;
pub mod report;
pub mod threshold;
pub mod variation;

pub use engine::{global_score, score};
pub use metrics::{brand_metrics, competitor_metrics, model_metrics};
pub use report::{build_report, rules_for_project};
pub use threshold::lookup_threshold;
pub use variation::{
    compute_all_variations, compute_model_variations, compute_variation, Metric, VariationResult,
};

/// Round to two decimal places, the precision every reported score uses.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean of `values`, summed in sorted order so the result does
/// not depend on input order. `None` when empty.
#[must_use]
pub(crate) fn stable_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    #[allow(clippy::cast_precision_loss)]
    let len = sorted.len() as f64;
    Some(sorted.iter().sum::<f64>() / len)
}
