//! Runtime configuration, read from the environment.
//!
//! Binaries call `dotenv::dotenv().ok()` before `Config::from_env()` so a
//! local `.env` file works the same as real environment variables.

use crate::error::{HoopError, Result};

/// Settings shared by the CLI and the HTTP server.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    /// Model for SQL generation, repair and narrative analysis (temperature 0).
    pub openai_model: String,
    /// Model for dashboard interpretation (JSON mode, low temperature).
    pub dashboard_model: String,
    pub openai_base_url: String,
    pub row_limit: u32,
    pub statement_timeout_ms: u64,
    pub cost_ceiling: f64,
    pub max_repair_attempts: u8,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| HoopError::Config("DATABASE_URL is not set".to_string()))?;

        // "dummy-api-key" switches the LLM client into mock mode (tests, demos).
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .unwrap_or_else(|_| "dummy-api-key".to_string());

        let openai_model = std::env::var("OPENAI_MODEL")
            .unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let dashboard_model = std::env::var("DASHBOARD_MODEL")
            .unwrap_or_else(|_| "gpt-4-turbo-preview".to_string());
        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            database_url,
            openai_api_key,
            openai_model,
            dashboard_model,
            openai_base_url,
            row_limit: parse_env("HOOPQUERY_ROW_LIMIT", 50)?,
            statement_timeout_ms: parse_env("HOOPQUERY_STATEMENT_TIMEOUT_MS", 3000)?,
            cost_ceiling: parse_env("HOOPQUERY_COST_CEILING", 100_000.0)?,
            max_repair_attempts: parse_env("HOOPQUERY_MAX_REPAIR_ATTEMPTS", 3)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| HoopError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
