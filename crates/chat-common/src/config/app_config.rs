//! Client configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.

use super::{OverflowStrategy, QueueOptions, TimeoutStrategy};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub queue: QueueOptions,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Bot or user token sent in Identify
    #[serde(default)]
    pub token: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "chat-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "ws://127.0.0.1:8081/gateway".to_string()
}

/// Parse an optional environment variable, rejecting malformed values
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable holds a malformed value or the queue
    /// options fail validation
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                url: env::var("GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
                token: env::var("GATEWAY_TOKEN").ok().filter(|t| !t.is_empty()),
            },
            queue: Self::queue_from_env()?,
        };

        config.queue.validate()?;
        Ok(config)
    }

    fn queue_from_env() -> Result<QueueOptions, ConfigError> {
        let defaults = QueueOptions::default();

        Ok(QueueOptions {
            enable_buffering: parse_var("GATEWAY_QUEUE_ENABLE_BUFFERING")?
                .unwrap_or(defaults.enable_buffering),
            max_sequence_number: parse_var("GATEWAY_QUEUE_MAX_SEQUENCE")?
                .unwrap_or(defaults.max_sequence_number),
            buffer_capacity: parse_var("GATEWAY_QUEUE_BUFFER_CAPACITY")?
                .unwrap_or(defaults.buffer_capacity),
            overflow_strategy: parse_var::<OverflowStrategy>("GATEWAY_QUEUE_OVERFLOW_STRATEGY")?
                .unwrap_or(defaults.overflow_strategy),
            wait_timeout: parse_var::<u64>("GATEWAY_QUEUE_WAIT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .or(defaults.wait_timeout),
            timeout_strategy: parse_var::<TimeoutStrategy>("GATEWAY_QUEUE_TIMEOUT_STRATEGY")?
                .unwrap_or(defaults.timeout_strategy),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
