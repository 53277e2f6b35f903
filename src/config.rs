//! Environment configuration.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::controller::{ControllerOptions, DEFAULT_TURN_TIMEOUT};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/v1/agent";
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub const ENV_TRANSPORT: &str = "AGUI_CHAT_TRANSPORT";
pub const ENV_ENDPOINT: &str = "AGUI_CHAT_ENDPOINT";
pub const ENV_ACCESS_TOKEN: &str = "AGUI_CHAT_ACCESS_TOKEN";
pub const ENV_TURN_TIMEOUT_SECS: &str = "AGUI_CHAT_TURN_TIMEOUT_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AGUI_CHAT_REQUEST_TIMEOUT_SECS";
pub const ENV_LOG: &str = "AGUI_CHAT_LOG";
pub const ENV_LOG_JSON: &str = "AGUI_CHAT_LOG_JSON";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("unknown transport {0:?} (expected \"agui\" or \"mock\")")]
    UnknownTransport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Agui,
    Mock,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agui => "agui",
            Self::Mock => "mock",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agui" => Ok(Self::Agui),
            "mock" => Ok(Self::Mock),
            _ => Err(ConfigError::UnknownTransport(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub transport: TransportKind,
    pub endpoint: String,
    pub access_token: Option<String>,
    /// `None` when the turn timeout is disabled.
    pub turn_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Agui,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            turn_timeout: Some(DEFAULT_TURN_TIMEOUT),
            request_timeout: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_json: false,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let transport = match env_string_opt(ENV_TRANSPORT) {
            Some(value) => TransportKind::parse(&value)?,
            None => defaults.transport,
        };

        let turn_timeout = match env_secs_opt(ENV_TURN_TIMEOUT_SECS)? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.turn_timeout,
        };

        let request_timeout = env_secs_opt(ENV_REQUEST_TIMEOUT_SECS)?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            transport,
            endpoint: env_string_opt(ENV_ENDPOINT).unwrap_or(defaults.endpoint),
            access_token: env_string_opt(ENV_ACCESS_TOKEN),
            turn_timeout,
            request_timeout,
            log_filter: env_string_opt(ENV_LOG).unwrap_or(defaults.log_filter),
            log_json: env_flag(ENV_LOG_JSON),
        })
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions::default().with_turn_timeout(self.turn_timeout)
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_secs_opt(key: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(value) = env_string_opt(key) else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { key, value })
}
