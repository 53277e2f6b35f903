//! Session-local conversation state.
//!
//! A [`ChatState`] lives exactly as long as the conversation view that owns
//! it. Its message list is append-only; assistant content only grows while the
//! message is active and is frozen afterwards.

use agent_protocol::{HistoryMessage, Role};
use time::OffsetDateTime;

/// Text of the synthetic assistant message appended when a turn fails.
pub const ERROR_APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    /// Synthetic failure notice; never produced by the remote agent.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }
}

/// Per-turn lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// Turn submitted, no assistant text opened yet.
    Awaiting,
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    Empty,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    messages: Vec<Message>,
    phase: TurnPhase,
    active_message_id: Option<String>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            phase: TurnPhase::Idle,
            active_message_id: None,
        }
    }

    /// Messages in creation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// True from turn submission until a terminal event is observed.
    pub fn is_busy(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    pub fn active_message_id(&self) -> Option<&str> {
        self.active_message_id.as_deref()
    }

    /// Returns the message currently receiving streamed content.
    pub fn active_message(&self) -> Option<&Message> {
        let id = self.active_message_id.as_deref()?;
        self.message(id)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Appends the user's message and opens a new turn.
    pub fn begin_turn(&mut self, text: &str, now: OffsetDateTime) -> Result<&Message, SubmitRejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitRejection::Empty);
        }
        if self.is_busy() {
            return Err(SubmitRejection::Busy);
        }

        let id = self.unique_id(&unix_millis(now).to_string());
        self.messages.push(Message {
            id,
            role: Role::User,
            kind: MessageKind::Text,
            content: text.to_string(),
            timestamp: now,
        });
        self.phase = TurnPhase::Awaiting;
        self.active_message_id = None;

        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Full ordered history replayed into each turn.
    pub fn history(&self) -> Vec<HistoryMessage> {
        self.messages
            .iter()
            .map(|message| HistoryMessage {
                id: message.id.clone(),
                role: message.role,
                content: message.content.clone(),
            })
            .collect()
    }

    /// Drops the transcript. Refused while a turn is in flight.
    pub fn clear(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.messages.clear();
        true
    }

    pub(crate) fn open_assistant_message(&mut self, id: String, now: OffsetDateTime) {
        self.messages.push(Message {
            id: id.clone(),
            role: Role::Assistant,
            kind: MessageKind::Text,
            content: String::new(),
            timestamp: now,
        });
        self.active_message_id = Some(id);
        self.phase = TurnPhase::Streaming;
    }

    pub(crate) fn append_to_active(&mut self, delta: &str) -> bool {
        let Some(active_id) = self.active_message_id.as_deref() else {
            return false;
        };
        match self
            .messages
            .iter_mut()
            .rev()
            .find(|message| message.id == active_id)
        {
            Some(message) => {
                message.content.push_str(delta);
                true
            }
            None => false,
        }
    }

    pub(crate) fn close_active_message(&mut self) {
        self.active_message_id = None;
    }

    pub(crate) fn end_turn(&mut self) {
        self.active_message_id = None;
        self.phase = TurnPhase::Idle;
    }

    pub(crate) fn push_error_message(&mut self, now: OffsetDateTime) {
        let id = self.unique_id(&format!("error-{}", unix_millis(now)));
        self.messages.push(Message {
            id,
            role: Role::Assistant,
            kind: MessageKind::Error,
            content: ERROR_APOLOGY_TEXT.to_string(),
            timestamp: now,
        });
    }

    /// Returns `base`, suffixed when needed so ids stay unique in the session.
    pub(crate) fn unique_id(&self, base: &str) -> String {
        if self.message(base).is_none() {
            return base.to_string();
        }

        (1..)
            .map(|suffix| format!("{base}-{suffix}"))
            .find(|candidate| self.message(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

pub(crate) fn unix_millis(now: OffsetDateTime) -> i128 {
    now.unix_timestamp_nanos() / 1_000_000
}
