use geolens_core::ScoringThreshold;

/// First threshold, in declaration order, whose `[min, max)` contains `value`.
///
/// Tables loaded through `ScoringRules::validate` are exhaustive and
/// gap-free, so `None` only occurs for hand-built tables or NaN input.
#[must_use]
pub fn lookup_threshold(table: &[ScoringThreshold], value: f64) -> Option<&ScoringThreshold> {
    if value.is_nan() {
        return None;
    }
    table.iter().find(|t| t.contains(value))
}
