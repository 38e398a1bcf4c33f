//! Retry with exponential back-off and jitter for provider calls.
//!
//! Rate limiting (429), server errors (5xx), timeouts and connection failures
//! are retried. Authentication failures, bad requests and undecodable bodies
//! are returned immediately. A provider's `Retry-After` replaces the computed
//! back-off for that attempt.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ProviderError;

const MAX_DELAY: Duration = Duration::from_secs(60);

/// How many extra attempts a call may make and how quickly they back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryBudget {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
        ProviderError::Timeout { .. } => true,
        ProviderError::Unavailable { .. }
        | ProviderError::Deserialize { .. }
        | ProviderError::EmptyResponse { .. }
        | ProviderError::MalformedResponse { .. } => false,
    }
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Wait before retry number `attempt` (1-based).
///
/// `backoff_base_ms × 2^(attempt-1) ± 25 %` unless the error carries a
/// `Retry-After`. Either way capped at 60 s.
fn delay_for(budget: RetryBudget, attempt: u32, err: &ProviderError) -> Duration {
    if let Some(wait) = err.retry_after() {
        return wait.min(MAX_DELAY);
    }
    let computed = Duration::from_millis(
        budget
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(10)),
    )
    .min(MAX_DELAY);
    computed.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
}

/// Runs `operation` with up to `budget.max_retries` additional attempts on
/// transient errors. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    budget: RetryBudget,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= budget.max_retries {
            return Err(err);
        }
        attempt += 1;
        let delay = delay_for(budget, attempt, &err);
        tracing::warn!(
            attempt,
            max_retries = budget.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            provider_requested = err.retry_after().is_some(),
            error = %err,
            "provider transient error, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
    }
}
