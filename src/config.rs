//! # Configuration Module
//!
//! Runtime configuration for the bot, the generative backend and the
//! marketing scheduler. Values come from the environment (a `.env` file is
//! loaded by `main`), with defaults for everything except credentials.

use std::env;
use std::str::FromStr;

use crate::error::{BotError, Result};

// Defaults for the generative backend
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
pub const DEFAULT_HISTORY_LIMIT: usize = 6;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Defaults for the marketing scheduler
pub const DEFAULT_SEND_HOUR: u32 = 10;
pub const DEFAULT_SEND_MINUTE: u32 = 0;
pub const DEFAULT_SEND_DELAY_MS: u64 = 100; // keeps fan-out under Telegram's ~30 msg/s limit

pub const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

/// Retry and circuit breaker settings for backend calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
        }
    }
}

/// Generative backend configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// `None` runs the adapters in fallback-only mode
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Conversation turns passed to the responder
    pub history_limit: usize,
    pub request_timeout_secs: u64,
    pub recovery: RecoveryConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Marketing broadcast configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Local hour of the daily scan (0-23)
    pub send_hour: u32,
    pub send_minute: u32,
    /// Pause between two sends of the same fan-out
    pub send_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            send_hour: DEFAULT_SEND_HOUR,
            send_minute: DEFAULT_SEND_MINUTE,
            send_delay_ms: DEFAULT_SEND_DELAY_MS,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub database_url: String,
    pub max_db_connections: u32,
    pub ai: AiConfig,
    pub scheduler: SchedulerConfig,
}

impl BotConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        let database_url = required("DATABASE_URL")?;

        let ai = AiConfig {
            api_key: env::var("GEMINI_API_KEY").ok().filter(|key| !key.trim().is_empty()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            ..AiConfig::default()
        };

        let scheduler = SchedulerConfig {
            enabled: parsed("MARKETING_ENABLED", true)?,
            send_hour: parsed("MARKETING_SEND_HOUR", DEFAULT_SEND_HOUR)?,
            send_minute: parsed("MARKETING_SEND_MINUTE", DEFAULT_SEND_MINUTE)?,
            send_delay_ms: parsed("MARKETING_SEND_DELAY_MS", DEFAULT_SEND_DELAY_MS)?,
        };
        if scheduler.send_hour > 23 || scheduler.send_minute > 59 {
            return Err(BotError::Config(format!(
                "invalid marketing send time {:02}:{:02}",
                scheduler.send_hour, scheduler.send_minute
            )));
        }

        Ok(Self {
            telegram_token,
            database_url,
            max_db_connections: parsed("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS)?,
            ai,
            scheduler,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| BotError::Config(format!("{key} must be set")))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BotError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_reasonable() {
        let ai = AiConfig::default();
        assert_eq!(ai.history_limit, 6);
        assert!(ai.api_key.is_none());
        assert!(ai.recovery.max_retries <= 10);
        assert!(ai.recovery.base_retry_delay_ms <= ai.recovery.max_retry_delay_ms);

        let scheduler = SchedulerConfig::default();
        assert!(scheduler.send_hour < 24);
        assert!(scheduler.send_delay_ms > 0);
    }

    #[test]
    fn test_parsed_falls_back_to_default() {
        let value: u32 = parsed("SAVDO_BOT_TEST_UNSET_VARIABLE", 17).unwrap();
        assert_eq!(value, 17);
    }
}
