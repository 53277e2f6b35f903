//! Terminal chat client for AG-UI agents.
//!
//! Transport selection follows `AGUI_CHAT_TRANSPORT`:
//!
//! - `agui` (default) streams from `AGUI_CHAT_ENDPOINT`, falling back to
//!   `http://localhost:8000/api/v1/agent`
//! - `mock` echoes prompts locally with a short per-token delay
//!
//! See `agui_chat::config` for the remaining variables.

pub mod commands;
pub mod repl;
pub mod transports;
