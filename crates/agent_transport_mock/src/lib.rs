//! Deterministic mock implementation of the shared `agent_protocol` contract.
//!
//! This crate contains no transport logic. It replays scripted event streams
//! and is intended for local development and controller-level testing.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use agent_protocol::{
    AgentEvent, AgentTransport, CancelSignal, Role, TransportProfile, TurnRequest,
};

/// Stable transport identifier used for explicit startup selection.
pub const MOCK_TRANSPORT_ID: &str = "mock";

/// One scripted step of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Emit(AgentEvent),
    Sleep(Duration),
    /// Blocks until the turn's cancel signal is raised.
    Hang,
    /// Ends the turn with a transport-level failure.
    Fail(String),
    Panic(String),
}

/// Scripted behaviour for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnScript {
    steps: Vec<ScriptStep>,
}

impl TurnScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard successful reply: start, one delta per chunk, end, finished.
    #[must_use]
    pub fn reply(message_id: &str, chunks: &[&str]) -> Self {
        let mut script = Self::new().emit(AgentEvent::TextMessageStart {
            message_id: Some(message_id.to_string()),
        });
        for chunk in chunks {
            script = script.emit(AgentEvent::TextMessageContent {
                message_id: message_id.to_string(),
                delta: (*chunk).to_string(),
            });
        }
        script
            .emit(AgentEvent::TextMessageEnd {
                message_id: message_id.to_string(),
            })
            .emit(AgentEvent::RunFinished)
    }

    #[must_use]
    pub fn emit(mut self, event: AgentEvent) -> Self {
        self.steps.push(ScriptStep::Emit(event));
        self
    }

    #[must_use]
    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Sleep(duration));
        self
    }

    #[must_use]
    pub fn hang(mut self) -> Self {
        self.steps.push(ScriptStep::Hang);
        self
    }

    #[must_use]
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Fail(error.into()));
        self
    }

    #[must_use]
    pub fn panic(mut self, message: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Panic(message.into()));
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

/// Deterministic mock transport.
///
/// Queued scripts are consumed one per turn. Once the queue is empty, turns
/// fall back to echoing the latest user message as a streamed reply.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<VecDeque<TurnScript>>,
    requests: Mutex<Vec<TurnRequest>>,
    token_delay: Duration,
}

impl MockTransport {
    /// Creates a mock transport that replays `scripts` in order.
    #[must_use]
    pub fn scripted(scripts: Vec<TurnScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            token_delay: Duration::ZERO,
        }
    }

    /// Creates an echo transport that pauses `token_delay` between deltas.
    #[must_use]
    pub fn echo(token_delay: Duration) -> Self {
        Self {
            token_delay,
            ..Self::default()
        }
    }

    pub fn push_script(&self, script: TurnScript) {
        lock_unpoisoned(&self.scripts).push_back(script);
    }

    /// Returns every request received so far, in order.
    pub fn requests(&self) -> Vec<TurnRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn echo_script(&self, req: &TurnRequest) -> TurnScript {
        let prompt = req
            .messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let message_id = format!("mock-{}", req.turn_id);

        let mut script = TurnScript::new().emit(AgentEvent::TextMessageStart {
            message_id: Some(message_id.clone()),
        });
        for token in split_tokens(&format!("You said: {prompt}")) {
            script = script
                .emit(AgentEvent::TextMessageContent {
                    message_id: message_id.clone(),
                    delta: token,
                })
                .sleep(self.token_delay);
        }
        script
            .emit(AgentEvent::TextMessageEnd { message_id })
            .emit(AgentEvent::RunFinished)
    }

    const HANG_POLL: Duration = Duration::from_millis(5);
}

impl AgentTransport for MockTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: MOCK_TRANSPORT_ID.to_string(),
            endpoint: "memory://mock".to_string(),
        }
    }

    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(AgentEvent),
    ) -> Result<(), String> {
        lock_unpoisoned(&self.requests).push(req.clone());
        let script = lock_unpoisoned(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| self.echo_script(&req));

        for step in script.steps {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }

            match step {
                ScriptStep::Emit(event) => emit(event),
                ScriptStep::Sleep(duration) => {
                    if !duration.is_zero() {
                        thread::sleep(duration);
                    }
                }
                ScriptStep::Hang => {
                    while !cancel.load(Ordering::SeqCst) {
                        thread::sleep(Self::HANG_POLL);
                    }
                    return Ok(());
                }
                ScriptStep::Fail(error) => return Err(error),
                ScriptStep::Panic(message) => panic!("{message}"),
            }
        }

        Ok(())
    }
}

fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    for ch in text.chars() {
        pending.push(ch);
        if ch == ' ' {
            tokens.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use agent_protocol::HistoryMessage;
    use pretty_assertions::assert_eq;

    use super::*;

    fn request(turn_id: u64, prompt: &str) -> TurnRequest {
        TurnRequest {
            turn_id,
            thread_id: "thread".to_string(),
            run_id: format!("run-{turn_id}"),
            messages: vec![HistoryMessage {
                id: turn_id.to_string(),
                role: Role::User,
                content: prompt.to_string(),
            }],
            tools: Vec::new(),
        }
    }

    fn collect(transport: &MockTransport, req: TurnRequest) -> (Result<(), String>, Vec<AgentEvent>) {
        let mut events = Vec::new();
        let result = transport.run(req, Arc::new(AtomicBool::new(false)), &mut |event| {
            events.push(event)
        });
        (result, events)
    }

    #[test]
    fn scripted_turns_replay_in_order() {
        let transport = MockTransport::scripted(vec![
            TurnScript::reply("a1", &[" Hi", " there"]),
            TurnScript::new().emit(AgentEvent::run_error("timeout", None)),
        ]);

        let (first, events) = collect(&transport, request(1, "Hello"));
        assert_eq!(first, Ok(()));
        assert_eq!(events.len(), 5);
        assert_eq!(events.last(), Some(&AgentEvent::RunFinished));

        let (second, events) = collect(&transport, request(2, "Y"));
        assert_eq!(second, Ok(()));
        assert_eq!(events, vec![AgentEvent::run_error("timeout", None)]);

        assert_eq!(transport.requests().len(), 2);
    }

    #[test]
    fn echo_fallback_streams_user_prompt_back() {
        let transport = MockTransport::echo(Duration::ZERO);
        let (_, events) = collect(&transport, request(3, "ping pong"));

        let text: String = events
            .iter()
            .filter_map(|event| match event {
                AgentEvent::TextMessageContent { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "You said: ping pong");
        assert_eq!(
            events.first(),
            Some(&AgentEvent::TextMessageStart {
                message_id: Some("mock-3".to_string())
            })
        );
    }

    #[test]
    fn fail_step_returns_transport_error() {
        let transport = MockTransport::scripted(vec![TurnScript::new().fail("connection refused")]);
        let (result, events) = collect(&transport, request(1, "x"));
        assert_eq!(result, Err("connection refused".to_string()));
        assert!(events.is_empty());
    }

    #[test]
    fn hang_step_returns_once_cancelled() {
        let transport = Arc::new(MockTransport::scripted(vec![TurnScript::new()
            .emit(AgentEvent::TextMessageStart { message_id: None })
            .hang()
            .emit(AgentEvent::RunFinished)]));
        let cancel = Arc::new(AtomicBool::new(false));

        let worker = {
            let transport = Arc::clone(&transport);
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || {
                let mut events = Vec::new();
                let result = transport.run(request(1, "x"), cancel, &mut |event| events.push(event));
                (result, events)
            })
        };

        thread::sleep(Duration::from_millis(20));
        cancel.store(true, Ordering::SeqCst);
        let (result, events) = worker.join().expect("worker should not panic");

        assert_eq!(result, Ok(()));
        assert_eq!(events, vec![AgentEvent::TextMessageStart { message_id: None }]);
    }
}
