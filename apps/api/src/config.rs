use anyhow::{anyhow, Context, Result};

use crate::career::ledger::UnresolvedPayPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Shared rate-limit window. Unset means a per-process limiter.
    pub redis_url: Option<String>,
    /// Unset disables the extract endpoint (501).
    pub extraction_service_url: Option<String>,
    pub extraction_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub unresolved_pay_policy: UnresolvedPayPolicy,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            extraction_service_url: optional_env("EXTRACTION_SERVICE_URL"),
            extraction_api_key: optional_env("EXTRACTION_API_KEY"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            unresolved_pay_policy: optional_env("UNRESOLVED_PAY_POLICY")
                .map(|v| v.parse::<UnresolvedPayPolicy>())
                .transpose()
                .map_err(|e| anyhow!("UNRESOLVED_PAY_POLICY: {e}"))?
                .unwrap_or_default(),
            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<u32>()
                .context("RATE_LIMIT_MAX_REQUESTS must be a positive integer")?,
            rate_limit_window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<u64>()
                .context("RATE_LIMIT_WINDOW_SECS must be a positive integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
impl Config {
    /// Defaults for router tests; nothing here is read from the environment.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://unused".to_string(),
            redis_url: None,
            extraction_service_url: None,
            extraction_api_key: None,
            port: 0,
            rust_log: "debug".to_string(),
            unresolved_pay_policy: UnresolvedPayPolicy::Record,
            rate_limit_max_requests: 60,
            rate_limit_window_secs: 60,
        }
    }
}
