//! Streaming chat session core for AG-UI agents.
//!
//! A [`ChatController`] owns one conversation: it submits user turns to an
//! [`AgentTransport`], replays the full history into each turn, and folds the
//! streamed events into an ordered transcript through the pure [`reduce`]
//! function. At most one turn is in flight; every turn ends in exactly one
//! terminal state, and a failed turn leaves a single apology message behind.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agui_chat::{ChatController, ControllerOptions};
//! # fn transport() -> Arc<dyn agui_chat::AgentTransport> { unimplemented!() }
//!
//! let mut controller = ChatController::new(transport(), ControllerOptions::default());
//! controller.submit("Hello");
//! controller.run_until_idle(|_, _| {});
//! for message in controller.messages() {
//!     println!("{}: {}", message.role.as_str(), message.content);
//! }
//! ```

pub mod config;
pub mod controller;
pub mod logging;
pub mod reducer;
pub mod session;

pub use agent_protocol::{
    AgentEvent, AgentTransport, CancelSignal, HistoryMessage, Role, ToolDefinition,
    TransportInitError, TransportProfile, TurnId, TurnRequest,
};

pub use crate::config::{ConfigError, EnvConfig, TransportKind};
pub use crate::controller::{
    ChatController, ControllerOptions, PollOutcome, SubmitOutcome, DEFAULT_TURN_TIMEOUT,
};
pub use crate::reducer::{reduce, IgnoreReason, Reduction};
pub use crate::session::{
    ChatState, Message, MessageKind, SubmitRejection, TurnPhase, ERROR_APOLOGY_TEXT,
};
