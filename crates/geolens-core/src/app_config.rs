use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Credentials and model selection for one AI provider.
///
/// A provider with no `api_key` is constructed but reported unavailable.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub rules_path: PathBuf,
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub gemini: ProviderSettings,
    pub perplexity: ProviderSettings,
    pub provider_timeout_secs: u64,
    pub provider_max_concurrency: usize,
    pub provider_max_retries: u32,
    pub provider_retry_backoff_base_ms: u64,
    pub cell_timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub batch_timeout_secs: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("rules_path", &self.rules_path)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("openai", &self.openai)
            .field("anthropic", &self.anthropic)
            .field("gemini", &self.gemini)
            .field("perplexity", &self.perplexity)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("provider_max_concurrency", &self.provider_max_concurrency)
            .field("provider_max_retries", &self.provider_max_retries)
            .field(
                "provider_retry_backoff_base_ms",
                &self.provider_retry_backoff_base_ms,
            )
            .field("cell_timeout_secs", &self.cell_timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("batch_timeout_secs", &self.batch_timeout_secs)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
