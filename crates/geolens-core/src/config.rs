use crate::app_config::{AppConfig, Environment, ProviderSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let provider = |prefix: &str, key_var: &str, default_model: &str| ProviderSettings {
        api_key: optional(key_var),
        model: or_default(&format!("GEOLENS_{prefix}_MODEL"), default_model),
        base_url: optional(&format!("GEOLENS_{prefix}_BASE_URL")),
    };

    let env = parse_environment(&or_default("GEOLENS_ENV", "development"))?;
    let database_url = optional("DATABASE_URL");
    let log_level = or_default("GEOLENS_LOG_LEVEL", "info");
    let rules_path = PathBuf::from(or_default(
        "GEOLENS_RULES_PATH",
        "./config/scoring_rules.yaml",
    ));

    let openai = provider("OPENAI", "OPENAI_API_KEY", "gpt-4o-mini");
    let anthropic = provider("ANTHROPIC", "ANTHROPIC_API_KEY", "claude-3-5-haiku-latest");
    let gemini = provider("GEMINI", "GEMINI_API_KEY", "gemini-1.5-flash");
    let perplexity = provider("PERPLEXITY", "PERPLEXITY_API_KEY", "sonar");

    let provider_timeout_secs = parse_u64("GEOLENS_PROVIDER_TIMEOUT_SECS", "60")?;
    let provider_max_concurrency = parse_usize("GEOLENS_PROVIDER_MAX_CONCURRENCY", "4")?;
    if provider_max_concurrency == 0 {
        return Err(invalid(
            "GEOLENS_PROVIDER_MAX_CONCURRENCY",
            "must be at least 1".to_string(),
        ));
    }
    let provider_max_retries = parse_u32("GEOLENS_PROVIDER_MAX_RETRIES", "2")?;
    let provider_retry_backoff_base_ms =
        parse_u64("GEOLENS_PROVIDER_RETRY_BACKOFF_BASE_MS", "1000")?;
    let cell_timeout_secs = parse_u64("GEOLENS_CELL_TIMEOUT_SECS", "180")?;

    let temperature = or_default("GEOLENS_TEMPERATURE", "0.2")
        .parse::<f32>()
        .map_err(|e| invalid("GEOLENS_TEMPERATURE", e.to_string()))?;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(invalid(
            "GEOLENS_TEMPERATURE",
            format!("{temperature} is outside 0.0..=2.0"),
        ));
    }
    let max_output_tokens = parse_u32("GEOLENS_MAX_OUTPUT_TOKENS", "1024")?;
    let batch_timeout_secs = parse_u64("GEOLENS_BATCH_TIMEOUT_SECS", "600")?;

    let db_max_connections = parse_u32("GEOLENS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("GEOLENS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("GEOLENS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        rules_path,
        openai,
        anthropic,
        gemini,
        perplexity,
        provider_timeout_secs,
        provider_max_concurrency,
        provider_max_retries,
        provider_retry_backoff_base_ms,
        cell_timeout_secs,
        temperature,
        max_output_tokens,
        batch_timeout_secs,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GEOLENS_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
