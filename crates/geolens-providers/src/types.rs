use std::time::Duration;

use geolens_core::TokenUsage;
use serde::{Deserialize, Serialize};

/// The AI providers geolens can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Perplexity,
}

/// What a provider can do beyond plain text completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Native JSON output mode.
    pub structured_output: bool,
    /// Answers grounded in live web search.
    pub search: bool,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Perplexity,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Perplexity => "perplexity",
        }
    }

    #[must_use]
    pub fn capabilities(self) -> Capabilities {
        match self {
            ProviderKind::OpenAi | ProviderKind::Gemini => Capabilities {
                structured_output: true,
                search: false,
            },
            ProviderKind::Anthropic => Capabilities {
                structured_output: false,
                search: false,
            },
            ProviderKind::Perplexity => Capabilities {
                structured_output: false,
                search: true,
            },
        }
    }

    pub(crate) fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Perplexity => "https://api.perplexity.ai",
        }
    }

    /// List price in USD per million (input, output) tokens for the default
    /// model tier. Used for cost estimates only.
    #[must_use]
    pub fn price_per_million(self) -> (f64, f64) {
        match self {
            ProviderKind::OpenAi => (0.15, 0.60),
            ProviderKind::Anthropic => (0.80, 4.00),
            ProviderKind::Gemini => (0.075, 0.30),
            ProviderKind::Perplexity => (1.00, 1.00),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "perplexity" => Ok(ProviderKind::Perplexity),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Overrides the adapter's configured model when set.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    pub system: Option<String>,
    /// Ask for native JSON output where the provider supports it.
    pub json_mode: bool,
    /// Extra attempts on transient errors; `None` uses the adapter's limit.
    pub max_retries: Option<u32>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.2,
            max_output_tokens: 1024,
            timeout: Duration::from_secs(60),
            system: None,
            json_mode: false,
            max_retries: None,
        }
    }
}

/// One completed provider exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub provider: ProviderKind,
    /// Model version reported by the provider, or the requested model.
    pub model: String,
    pub prompt_id: Option<String>,
    pub text: String,
    pub usage: TokenUsage,
    pub latency_ms: u64,
}

impl RawResponse {
    #[must_use]
    pub fn with_prompt_id(mut self, prompt_id: impl Into<String>) -> Self {
        self.prompt_id = Some(prompt_id.into());
        self
    }
}

/// The JSON shape a structured call must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    /// Example object with every field present.
    pub shape: &'static str,
}

impl OutputSchema {
    #[must_use]
    pub fn format_instructions(&self) -> String {
        format!(
            "Respond with a single JSON object and nothing else. \
             Use exactly these fields and value types:\n{}",
            self.shape
        )
    }

    #[must_use]
    pub fn append_to(&self, prompt: &str) -> String {
        format!("{prompt}\n\n{}", self.format_instructions())
    }
}

/// A decoded structured answer.
#[derive(Debug, Clone)]
pub struct Structured<T> {
    pub value: T,
    /// `true` when the first answer was malformed and a repair call succeeded.
    pub repaired: bool,
    /// The exchange the value was decoded from.
    pub raw: RawResponse,
}

/// Counters accumulated by one adapter since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub usage: TokenUsage,
}

impl UsageSnapshot {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimated_cost_usd(&self, kind: ProviderKind) -> f64 {
        let (input, output) = kind.price_per_million();
        (self.usage.input_tokens as f64 * input + self.usage.output_tokens as f64 * output)
            / 1_000_000.0
    }
}
