use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentApiError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("expected an event stream but received '{content_type}': {message}")]
    UnexpectedContentType {
        content_type: String,
        message: String,
    },

    #[error("request was cancelled")]
    Cancelled,

    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl AgentApiError {
    /// Returns true when the failure was caused by the caller's cancel signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error body shapes an agent endpoint may return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Structured { error: ErrorFields },
    Plain { error: String },
    Detail { detail: serde_json::Value },
}

#[derive(Debug, Deserialize)]
struct ErrorFields {
    message: Option<String>,
    code: Option<String>,
}

/// Extracts a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        let message = match payload {
            ErrorPayload::Structured { error } => error
                .message
                .or(error.code)
                .filter(|value| !value.trim().is_empty()),
            ErrorPayload::Plain { error } => Some(error).filter(|value| !value.trim().is_empty()),
            ErrorPayload::Detail { detail } => match detail {
                serde_json::Value::String(text) if !text.trim().is_empty() => Some(text),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            },
        };
        if let Some(message) = message {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
