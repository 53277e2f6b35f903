//! Streaming session controller.
//!
//! One [`ChatController`] owns one conversation. Each accepted submission
//! opens a fresh transport call on a worker thread; its events travel over a
//! channel tagged with the turn id and are applied by the dispatch loop
//! ([`ChatController::poll`], [`ChatController::run_until_idle`]) on the
//! owner's thread. Events from any turn other than the active one are
//! discarded, and an abandoned turn's cancel signal is raised.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use agent_protocol::{AgentEvent, AgentTransport, CancelSignal, ToolDefinition, TurnId, TurnRequest};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::reducer::{reduce, Reduction};
use crate::session::{ChatState, Message, SubmitRejection};

/// Default bound on how long a turn may go without a terminal event.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    /// Conversation id sent with every turn; generated when absent.
    pub thread_id: Option<String>,
    /// `None` waits for a terminal event indefinitely.
    pub turn_timeout: Option<Duration>,
    pub tools: Vec<ToolDefinition>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            thread_id: None,
            turn_timeout: Some(DEFAULT_TURN_TIMEOUT),
            tools: Vec::new(),
        }
    }
}

impl ControllerOptions {
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Option<Duration>) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { turn_id: TurnId },
    Ignored(SubmitRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No turn is in flight.
    Idle,
    /// Nothing arrived within the wait.
    Pending,
    Applied {
        event: AgentEvent,
        reduction: Reduction,
    },
    /// Event belonged to an abandoned turn.
    Discarded { turn_id: TurnId },
    /// The active turn hit its deadline and was failed.
    TimedOut { turn_id: TurnId },
}

struct TurnEnvelope {
    turn_id: TurnId,
    event: AgentEvent,
}

struct ActiveTurn {
    turn_id: TurnId,
    cancel: CancelSignal,
    deadline: Option<Instant>,
    join_handle: Option<JoinHandle<()>>,
}

pub struct ChatController {
    state: ChatState,
    transport: Arc<dyn AgentTransport>,
    thread_id: String,
    turn_timeout: Option<Duration>,
    tools: Vec<ToolDefinition>,
    next_turn_id: TurnId,
    active_turn: Option<ActiveTurn>,
    sender: Sender<TurnEnvelope>,
    receiver: Receiver<TurnEnvelope>,
}

impl ChatController {
    pub fn new(transport: Arc<dyn AgentTransport>, options: ControllerOptions) -> Self {
        let (sender, receiver) = mpsc::channel();
        let thread_id = options
            .thread_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            state: ChatState::new(),
            transport,
            thread_id,
            turn_timeout: options.turn_timeout.filter(|timeout| !timeout.is_zero()),
            tools: options.tools,
            next_turn_id: 1,
            active_turn: None,
            sender,
            receiver,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn active_turn_id(&self) -> Option<TurnId> {
        self.active_turn.as_ref().map(|turn| turn.turn_id)
    }

    /// Submits one user turn without waiting for the reply.
    ///
    /// Blank text and submissions while a turn is in flight are ignored.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        let now = OffsetDateTime::now_utc();
        if let Err(rejection) = self.state.begin_turn(text, now) {
            tracing::debug!(?rejection, "submission ignored");
            return SubmitOutcome::Ignored(rejection);
        }

        self.abandon_active_turn();

        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;

        let request = TurnRequest {
            turn_id,
            thread_id: self.thread_id.clone(),
            run_id: Uuid::new_v4().to_string(),
            messages: self.state.history(),
            tools: self.tools.clone(),
        };
        tracing::info!(
            turn_id,
            run_id = %request.run_id,
            history = request.messages.len(),
            "turn submitted"
        );

        let cancel = Arc::new(AtomicBool::new(false));
        match self.spawn_worker(request, Arc::clone(&cancel)) {
            Ok(join_handle) => {
                self.active_turn = Some(ActiveTurn {
                    turn_id,
                    cancel,
                    deadline: self
                        .turn_timeout
                        .and_then(|timeout| Instant::now().checked_add(timeout)),
                    join_handle: Some(join_handle),
                });
            }
            Err(error) => {
                tracing::warn!(turn_id, %error, "failed to start turn");
                reduce(
                    &mut self.state,
                    &AgentEvent::run_error(error, Some("spawn")),
                    now,
                );
            }
        }

        SubmitOutcome::Accepted { turn_id }
    }

    /// Waits up to `wait` for one event of the active turn and applies it.
    pub fn poll(&mut self, wait: Duration) -> PollOutcome {
        let Some(deadline) = self.active_turn.as_ref().map(|turn| turn.deadline) else {
            return PollOutcome::Idle;
        };

        let (wait, bounded_by_deadline) = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return self.expire_active_turn();
                }
                if remaining <= wait {
                    (remaining, true)
                } else {
                    (wait, false)
                }
            }
            None => (wait, false),
        };

        match self.receiver.recv_timeout(wait) {
            Ok(envelope) => self.dispatch(envelope),
            Err(RecvTimeoutError::Timeout) if bounded_by_deadline => self.expire_active_turn(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                PollOutcome::Pending
            }
        }
    }

    /// Applies every event that has already arrived without blocking.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0usize;
        loop {
            match self.poll(Duration::ZERO) {
                PollOutcome::Applied { .. } | PollOutcome::TimedOut { .. } => applied += 1,
                PollOutcome::Discarded { .. } => {}
                PollOutcome::Idle | PollOutcome::Pending => return applied,
            }
        }
    }

    /// Runs the dispatch loop until the active turn reaches a terminal state.
    ///
    /// `observer` sees the state right after each applied event.
    pub fn run_until_idle<F>(&mut self, mut observer: F)
    where
        F: FnMut(&ChatState, &AgentEvent),
    {
        while self.active_turn.is_some() {
            if let PollOutcome::Applied { event, .. } = self.poll(IDLE_POLL_INTERVAL) {
                observer(&self.state, &event);
            }
        }
    }

    /// Drops the transcript. Refused while a turn is in flight.
    pub fn clear(&mut self) -> bool {
        self.state.clear()
    }

    fn dispatch(&mut self, envelope: TurnEnvelope) -> PollOutcome {
        let TurnEnvelope { turn_id, event } = envelope;
        if self.active_turn_id() != Some(turn_id) {
            tracing::debug!(turn_id, kind = event.kind(), "discarding event from abandoned turn");
            return PollOutcome::Discarded { turn_id };
        }

        if let AgentEvent::RunError { message, code } = &event {
            tracing::warn!(turn_id, code = code.as_deref(), %message, "agent run failed");
        }

        let reduction = reduce(&mut self.state, &event, OffsetDateTime::now_utc());
        match reduction {
            Reduction::Applied => tracing::trace!(turn_id, kind = event.kind(), "event applied"),
            Reduction::Ignored(reason) => tracing::debug!(
                turn_id,
                kind = event.kind(),
                reason = reason.as_str(),
                "event ignored"
            ),
        }

        if !self.state.is_busy() {
            tracing::info!(turn_id, messages = self.state.messages().len(), "turn completed");
            self.finish_active_turn();
        }

        PollOutcome::Applied { event, reduction }
    }

    fn expire_active_turn(&mut self) -> PollOutcome {
        let Some(turn) = self.active_turn.take() else {
            return PollOutcome::Idle;
        };
        turn.cancel.store(true, Ordering::SeqCst);
        tracing::warn!(
            turn_id = turn.turn_id,
            timeout = ?self.turn_timeout,
            "turn timed out without a terminal event"
        );

        reduce(
            &mut self.state,
            &AgentEvent::run_error("turn timed out", Some("timeout")),
            OffsetDateTime::now_utc(),
        );
        PollOutcome::TimedOut {
            turn_id: turn.turn_id,
        }
    }

    fn finish_active_turn(&mut self) {
        let Some(mut completed) = self.active_turn.take() else {
            return;
        };
        // A transport may hold its stream open past the terminal event.
        completed.cancel.store(true, Ordering::SeqCst);

        if let Some(join_handle) = completed.join_handle.take() {
            if join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    fn abandon_active_turn(&mut self) {
        if let Some(turn) = self.active_turn.take() {
            tracing::debug!(turn_id = turn.turn_id, "cancelling abandoned turn");
            turn.cancel.store(true, Ordering::SeqCst);
        }
    }

    fn spawn_worker(
        &self,
        request: TurnRequest,
        cancel: CancelSignal,
    ) -> Result<JoinHandle<()>, String> {
        let turn_id = request.turn_id;
        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();

        thread::Builder::new()
            .name(format!("agui-chat-turn-{turn_id}"))
            .spawn(move || run_worker(transport, request, cancel, sender))
            .map_err(|error| format!("Failed to spawn turn worker: {error}"))
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.abandon_active_turn();
    }
}

fn run_worker(
    transport: Arc<dyn AgentTransport>,
    request: TurnRequest,
    cancel: CancelSignal,
    sender: Sender<TurnEnvelope>,
) {
    let turn_id = request.turn_id;
    let span = tracing::info_span!("turn", turn_id);
    let _entered = span.enter();

    let mut terminal_emitted = false;
    let mut emit = |event: AgentEvent| {
        if event.is_terminal() {
            terminal_emitted = true;
        }
        let _ = sender.send(TurnEnvelope { turn_id, event });
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        transport.run(request, Arc::clone(&cancel), &mut emit)
    }));

    if terminal_emitted || cancel.load(Ordering::SeqCst) {
        return;
    }

    let failure = match outcome {
        Ok(Ok(())) => "transport exited without terminal event".to_string(),
        Ok(Err(error)) => error,
        Err(_) => "transport panicked".to_string(),
    };
    tracing::debug!(%failure, "synthesizing terminal failure");
    let _ = sender.send(TurnEnvelope {
        turn_id,
        event: AgentEvent::run_error(failure, Some("transport")),
    });
}
