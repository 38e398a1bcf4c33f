use std::time::Duration;

use thiserror::Error;

/// Errors returned by a provider adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has no credentials configured.
    #[error("provider {provider} is unavailable: no API key configured")]
    Unavailable { provider: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
        /// Wait requested by the provider's `Retry-After` header.
        retry_after: Option<Duration>,
    },

    #[error("{provider} did not answer within {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The response body could not be deserialized into the expected wire type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{provider} returned no text content")]
    EmptyResponse { provider: String },

    /// The model answered but no JSON block matching the schema could be recovered.
    #[error("{provider} returned a malformed structured response: {reason}")]
    MalformedResponse { provider: String, reason: String },
}

impl ProviderError {
    /// How long the provider asked callers to wait before trying again.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
