//! Process configuration.
//!
//! Everything is read once at start-up from the environment, optionally
//! seeded from a `.env` file. Nothing here is consulted while a conversation
//! is running; the orchestrator receives the values it needs explicitly.

use crate::error::{Result, TripcastError};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_WEATHER_BASE_URL: &str = "http://api.openweathermap.org";
pub const DEFAULT_PARTNER_TOOL_NAME: &str = "business_partner_lookup";

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub llm_model: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    /// `None` selects the deterministic mock weather provider.
    pub weather_api_key: Option<String>,
    pub weather_base_url: String,
    /// `None` selects the built-in static partner table.
    pub partner_tool_url: Option<String>,
    pub partner_tool_name: String,
    pub context_window: usize,
    pub max_tool_rounds: usize,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            llm_model: "gpt-4o-mini".to_string(),
            llm_api_key: String::new(),
            llm_base_url: DEFAULT_OPENAI_ENDPOINT.to_string(),
            weather_api_key: None,
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            partner_tool_url: None,
            partner_tool_name: DEFAULT_PARTNER_TOOL_NAME.to_string(),
            context_window: 5,
            max_tool_rounds: 4,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present;
    /// variables already set in the environment take precedence over it.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load a specific `.env` file into the environment, then read the config.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenv::from_path(path.as_ref()).map_err(|e| {
            TripcastError::ConfigError(format!(
                "failed to load {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            llm_model: non_empty("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_api_key: lookup("OPENAI_API_KEY").unwrap_or(defaults.llm_api_key),
            llm_base_url: non_empty("OPENAI_API_ENDPOINT").unwrap_or(defaults.llm_base_url),
            weather_api_key: non_empty("OPENWEATHERMAP_API_KEY"),
            weather_base_url: non_empty("OPENWEATHERMAP_BASE_URL")
                .unwrap_or(defaults.weather_base_url),
            partner_tool_url: non_empty("PARTNER_TOOL_URL"),
            partner_tool_name: non_empty("PARTNER_TOOL_NAME")
                .unwrap_or(defaults.partner_tool_name),
            context_window: parse_or(&lookup, "CONTEXT_WINDOW", defaults.context_window)?,
            max_tool_rounds: parse_or(&lookup, "MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            llm_timeout: Duration::from_secs(parse_or(
                &lookup,
                "LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            tool_timeout: Duration::from_secs(parse_or(
                &lookup,
                "TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_window == 0 {
            return Err(TripcastError::ConfigError(
                "CONTEXT_WINDOW must be at least 1".to_string(),
            ));
        }
        if self.max_tool_rounds < 2 {
            return Err(TripcastError::ConfigError(
                "MAX_TOOL_ROUNDS must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            TripcastError::ConfigError(format!("invalid value for {}: '{}' ({})", key, raw, e))
        }),
        _ => Ok(default),
    }
}
