//! Transport-neutral contract for streaming one conversational turn.
//!
//! This crate defines the shared turn lifecycle: the message history replayed
//! into every turn, the tagged event stream an agent pushes back, and the
//! [`AgentTransport`] seam. It contains no transport details and no session
//! state.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for one submitted turn within a session.
pub type TurnId = u64;

/// Shared cancellation flag for a turn.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing a transport before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInitError {
    message: String,
}

impl TransportInitError {
    /// Creates a new transport initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportInitError {}

impl From<String> for TransportInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TransportInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Conversational role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One item of the history replayed into every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// Tool made available to the remote agent for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

/// Input required to start one streaming turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub thread_id: String,
    pub run_id: String,
    pub messages: Vec<HistoryMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Server-pushed event for an in-flight turn, in arrival order.
///
/// Serialized with the AG-UI `type` tag so scripted streams and logs read the
/// same as the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentEvent {
    RunStarted {
        #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
        #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    TextMessageStart {
        #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    TextMessageContent {
        #[serde(rename = "messageId")]
        message_id: String,
        delta: String,
    },
    TextMessageEnd {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    RunFinished,
    RunError {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl AgentEvent {
    /// Returns true when this event terminates the turn and releases the busy lock.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished | Self::RunError { .. })
    }

    /// Returns the wire `type` name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "RUN_STARTED",
            Self::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            Self::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            Self::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            Self::RunFinished => "RUN_FINISHED",
            Self::RunError { .. } => "RUN_ERROR",
        }
    }

    pub fn run_error(message: impl Into<String>, code: Option<&str>) -> Self {
        Self::RunError {
            message: message.into(),
            code: code.map(ToString::to_string),
        }
    }
}

/// Immutable metadata describing a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportProfile {
    pub transport_id: String,
    pub endpoint: String,
}

/// Transport interface for streaming one turn.
pub trait AgentTransport: Send + Sync + 'static {
    /// Returns transport identity metadata.
    fn profile(&self) -> TransportProfile;

    /// Streams a turn and emits events in arrival order.
    ///
    /// Implementations block the calling thread until the stream ends or
    /// `cancel` is observed. Returning `Err` means the turn failed before or
    /// during streaming without a remote terminal event.
    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(AgentEvent),
    ) -> Result<(), String>;
}
