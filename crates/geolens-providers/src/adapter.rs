//! One adapter per provider: credentials, HTTP client, retry policy,
//! concurrency permits and usage counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use geolens_core::{AppConfig, ProviderSettings, TokenUsage};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ProviderError;
use crate::json::parse_json_block;
use crate::retry::{parse_retry_after, retry_with_backoff, RetryBudget};
use crate::types::{
    CallOptions, Capabilities, OutputSchema, ProviderKind, RawResponse, Structured, UsageSnapshot,
};
use crate::wire::{self, WireReply, WireRequest};

const MAX_ERROR_BODY_CHARS: usize = 500;

const REPAIR_SYSTEM: &str = "You convert malformed model output into valid JSON. \
    Reply with the corrected JSON object only.";

/// Retry, timeout and concurrency settings shared by every adapter.
#[derive(Debug, Clone, Copy)]
pub struct AdapterLimits {
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl AdapterLimits {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.provider_timeout_secs,
            max_concurrency: config.provider_max_concurrency,
            max_retries: config.provider_max_retries,
            backoff_base_ms: config.provider_retry_backoff_base_ms,
        }
    }
}

#[derive(Debug, Default)]
struct UsageCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl UsageCounters {
    fn record_success(&self, usage: TokenUsage) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            usage: TokenUsage::new(
                self.input_tokens.load(Ordering::Relaxed),
                self.output_tokens.load(Ordering::Relaxed),
            ),
        }
    }
}

/// Uniform text-in/text-out access to one AI provider.
///
/// Adapters are shared behind `Arc` by every concurrent unit of a batch.
/// Usage counters are atomic; the semaphore caps in-flight calls for this
/// provider across all batches holding the same adapter.
pub struct ProviderAdapter {
    kind: ProviderKind,
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: Client,
    limits: AdapterLimits,
    permits: Arc<Semaphore>,
    usage: UsageCounters,
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl ProviderAdapter {
    /// Creates an adapter from provider settings. A missing API key yields
    /// an adapter that reports itself unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        kind: ProviderKind,
        settings: &ProviderSettings,
        limits: AdapterLimits,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(limits.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("geolens/0.1 (brand-visibility)")
            .build()?;

        Ok(Self {
            kind,
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_owned()),
            client,
            limits,
            permits: Arc::new(Semaphore::new(limits.max_concurrency.max(1))),
            usage: UsageCounters::default(),
        })
    }

    /// Creates an adapter pointed at a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(
        kind: ProviderKind,
        api_key: &str,
        model: &str,
        base_url: &str,
        limits: AdapterLimits,
    ) -> Result<Self, ProviderError> {
        let settings = ProviderSettings {
            api_key: Some(api_key.to_owned()),
            model: model.to_owned(),
            base_url: Some(base_url.to_owned()),
        };
        Self::new(kind, &settings, limits)
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Configured default model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    #[must_use]
    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    /// Waits for a concurrency permit. Hold it for the duration of one
    /// unit of work, including any repair call.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the semaphore was closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ProviderError> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ProviderError::Unavailable {
                provider: self.kind.to_string(),
            })
    }

    /// Sends one prompt and returns the provider's text answer.
    ///
    /// Transient failures are retried with back-off. Every call, successful
    /// or not, is counted in [`ProviderAdapter::usage`].
    ///
    /// # Errors
    ///
    /// - [`ProviderError::Unavailable`] when no API key is configured.
    /// - [`ProviderError::Status`], [`ProviderError::Http`] or
    ///   [`ProviderError::Timeout`] once retries are exhausted.
    /// - [`ProviderError::Deserialize`] or [`ProviderError::EmptyResponse`]
    ///   when the reply cannot be decoded.
    pub async fn call(
        &self,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<RawResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable {
                provider: self.kind.to_string(),
            })?;
        let model = options.model.as_deref().unwrap_or(&self.model);
        let request = wire::build_request(self.kind, &self.base_url, api_key, model, prompt, options)?;

        let started = Instant::now();
        let budget = RetryBudget {
            max_retries: options.max_retries.unwrap_or(self.limits.max_retries),
            backoff_base_ms: self.limits.backoff_base_ms,
        };
        let result =
            retry_with_backoff(budget, || self.send_once(&request, model, options.timeout)).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(reply) => {
                self.usage.record_success(reply.usage);
                tracing::debug!(
                    provider = %self.kind,
                    model = %reply.model,
                    latency_ms,
                    input_tokens = reply.usage.input_tokens,
                    output_tokens = reply.usage.output_tokens,
                    "provider call succeeded"
                );
                Ok(RawResponse {
                    provider: self.kind,
                    model: reply.model,
                    prompt_id: None,
                    text: reply.text,
                    usage: reply.usage,
                    latency_ms,
                })
            }
            Err(err) => {
                self.usage.record_failure();
                tracing::warn!(
                    provider = %self.kind,
                    model,
                    latency_ms,
                    error = %err,
                    "provider call failed"
                );
                Err(err)
            }
        }
    }

    /// Asks the model to turn `malformed` into valid JSON matching `schema`.
    ///
    /// # Errors
    ///
    /// Same as [`ProviderAdapter::call`].
    pub async fn repair(
        &self,
        malformed: &str,
        schema: &OutputSchema,
        options: &CallOptions,
    ) -> Result<RawResponse, ProviderError> {
        let prompt = format!(
            "The following text was supposed to be a JSON object named \"{}\" but is not valid.\n\
             ---\n{malformed}\n---\n{}",
            schema.name,
            schema.format_instructions()
        );
        let repair_options = CallOptions {
            temperature: 0.0,
            system: Some(REPAIR_SYSTEM.to_owned()),
            json_mode: true,
            ..options.clone()
        };
        self.call(&prompt, &repair_options).await
    }

    /// Sends `prompt` with `schema`'s format instructions and decodes the answer.
    ///
    /// A malformed first answer triggers exactly one repair call.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MalformedResponse`] when neither answer
    /// decodes, or any error from [`ProviderAdapter::call`].
    pub async fn call_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema: &OutputSchema,
        options: &CallOptions,
    ) -> Result<Structured<T>, ProviderError> {
        let structured_options = CallOptions {
            json_mode: true,
            ..options.clone()
        };
        let raw = self
            .call(&schema.append_to(prompt), &structured_options)
            .await?;

        match parse_json_block::<T>(&raw.text) {
            Ok(value) => Ok(Structured {
                value,
                repaired: false,
                raw,
            }),
            Err(reason) => {
                tracing::debug!(
                    provider = %self.kind,
                    schema = schema.name,
                    %reason,
                    "structured answer malformed, attempting repair"
                );
                let repaired = self.repair(&raw.text, schema, options).await?;
                let value = parse_json_block::<T>(&repaired.text).map_err(|reason| {
                    ProviderError::MalformedResponse {
                        provider: self.kind.to_string(),
                        reason,
                    }
                })?;
                Ok(Structured {
                    value,
                    repaired: true,
                    raw: repaired,
                })
            }
        }
    }

    async fn send_once(
        &self,
        request: &WireRequest,
        model: &str,
        timeout: Duration,
    ) -> Result<WireReply, ProviderError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(timeout)
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: self.kind.to_string(),
                    secs: timeout.as_secs(),
                }
            } else {
                ProviderError::Http(e)
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: self.kind.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                retry_after,
            });
        }

        wire::parse_reply(self.kind, &body, model)
    }
}
