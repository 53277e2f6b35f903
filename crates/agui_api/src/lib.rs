//! Transport-only client primitives for AG-UI compatible agent endpoints.
//!
//! This crate owns request building, response validation, and incremental
//! SSE parsing for the agent endpoint only. It holds no session state and no
//! UI coupling; events are normalized into [`agent_protocol::AgentEvent`].
//!
//! Requests are never retried. A failed request surfaces once as an
//! [`AgentApiError`] and the caller decides what the user sees.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::AgentApiClient;
pub use client::CancellationSignal;
pub use client::StreamResult;
pub use config::AgentApiConfig;
pub use error::AgentApiError;
pub use payload::RunAgentInput;
pub use sse::SseStreamParser;
pub use url::normalize_agent_url;
