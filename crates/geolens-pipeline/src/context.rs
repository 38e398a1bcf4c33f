use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use geolens_core::{ProviderUsage, TokenUsage};
use geolens_providers::{ProviderKind, UsageSnapshot};
use uuid::Uuid;

/// Per-batch identity and usage accumulator.
///
/// Passed by reference into every cell of one batch. The usage map is the
/// only mutable state and is touched once per provider call.
#[derive(Debug)]
pub struct BatchContext {
    pub batch_id: Uuid,
    /// Ties every log line and the stored report to this run.
    pub correlation_id: Uuid,
    pub started_at: DateTime<Utc>,
    usage: Mutex<BTreeMap<ProviderKind, UsageSnapshot>>,
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchContext {
    #[must_use]
    pub fn new() -> Self {
        Self::with_correlation_id(Uuid::new_v4())
    }

    #[must_use]
    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            correlation_id,
            started_at: Utc::now(),
            usage: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_success(&self, provider: ProviderKind, usage: TokenUsage) {
        let mut map = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(provider).or_default();
        entry.calls += 1;
        entry.usage += usage;
    }

    pub fn record_failure(&self, provider: ProviderKind) {
        let mut map = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(provider).or_default();
        entry.calls += 1;
        entry.failures += 1;
    }

    /// Usage per provider in provider order, with cost estimates.
    #[must_use]
    pub fn usage_summary(&self) -> Vec<ProviderUsage> {
        let map = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        map.iter()
            .map(|(kind, snapshot)| ProviderUsage {
                provider: kind.to_string(),
                calls: snapshot.calls,
                failures: snapshot.failures,
                usage: snapshot.usage,
                estimated_cost_usd: snapshot.estimated_cost_usd(*kind),
            })
            .collect()
    }
}
