//! Pure state transitions from turn events to transcript state.
//!
//! `reduce` performs no I/O. Events are applied in delivery order; anomalies
//! (duplicate starts, stray deltas, events after the turn ended) are reported
//! as [`Reduction::Ignored`] and leave the state untouched.

use agent_protocol::AgentEvent;
use time::OffsetDateTime;

use crate::session::{unix_millis, ChatState, TurnPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Applied,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No turn is in flight.
    TurnNotActive,
    /// A message is already active for this turn.
    DuplicateStart,
    /// The start reuses the id of an existing message.
    DuplicateMessageId,
    /// The event names a message other than the active one.
    StaleMessageId,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TurnNotActive => "turn not active",
            Self::DuplicateStart => "duplicate start",
            Self::DuplicateMessageId => "duplicate message id",
            Self::StaleMessageId => "stale message id",
        }
    }
}

/// Applies one event to `state`.
///
/// `now` stamps any message the event creates.
pub fn reduce(state: &mut ChatState, event: &AgentEvent, now: OffsetDateTime) -> Reduction {
    match event {
        AgentEvent::RunStarted { .. } => {
            if state.phase() == TurnPhase::Idle {
                return Reduction::Ignored(IgnoreReason::TurnNotActive);
            }
            Reduction::Applied
        }
        AgentEvent::TextMessageStart { message_id } => on_message_start(state, message_id, now),
        AgentEvent::TextMessageContent { message_id, delta } => {
            if state.phase() == TurnPhase::Idle {
                return Reduction::Ignored(IgnoreReason::TurnNotActive);
            }
            if state.active_message_id() != Some(message_id.as_str()) {
                return Reduction::Ignored(IgnoreReason::StaleMessageId);
            }
            if state.append_to_active(delta) {
                Reduction::Applied
            } else {
                Reduction::Ignored(IgnoreReason::StaleMessageId)
            }
        }
        AgentEvent::TextMessageEnd { message_id } => {
            if state.phase() == TurnPhase::Idle {
                return Reduction::Ignored(IgnoreReason::TurnNotActive);
            }
            if state.active_message_id() != Some(message_id.as_str()) {
                return Reduction::Ignored(IgnoreReason::StaleMessageId);
            }
            state.close_active_message();
            Reduction::Applied
        }
        AgentEvent::RunFinished => {
            state.end_turn();
            Reduction::Applied
        }
        AgentEvent::RunError { .. } => {
            // One apology per failed turn; a second error for the same turn
            // finds the session idle.
            if state.phase() == TurnPhase::Idle {
                return Reduction::Ignored(IgnoreReason::TurnNotActive);
            }
            state.end_turn();
            state.push_error_message(now);
            Reduction::Applied
        }
    }
}

fn on_message_start(
    state: &mut ChatState,
    message_id: &Option<String>,
    now: OffsetDateTime,
) -> Reduction {
    if state.phase() == TurnPhase::Idle {
        return Reduction::Ignored(IgnoreReason::TurnNotActive);
    }
    if state.active_message_id().is_some() {
        return Reduction::Ignored(IgnoreReason::DuplicateStart);
    }

    let id = match message_id {
        Some(id) if state.message(id).is_some() => {
            return Reduction::Ignored(IgnoreReason::DuplicateMessageId);
        }
        Some(id) => id.clone(),
        None => state.unique_id(&format!("assistant-{}", unix_millis(now))),
    };

    state.open_assistant_message(id, now);
    Reduction::Applied
}

#[cfg(test)]
mod tests {
    use agent_protocol::Role;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    use super::*;
    use crate::session::{MessageKind, ERROR_APOLOGY_TEXT};

    const NOW: OffsetDateTime = datetime!(2026-01-02 03:04:05 UTC);

    fn start(id: &str) -> AgentEvent {
        AgentEvent::TextMessageStart {
            message_id: Some(id.to_string()),
        }
    }

    fn delta(id: &str, text: &str) -> AgentEvent {
        AgentEvent::TextMessageContent {
            message_id: id.to_string(),
            delta: text.to_string(),
        }
    }

    fn end(id: &str) -> AgentEvent {
        AgentEvent::TextMessageEnd {
            message_id: id.to_string(),
        }
    }

    fn submitted(text: &str) -> ChatState {
        let mut state = ChatState::new();
        state.begin_turn(text, NOW).expect("idle session accepts turn");
        state
    }

    fn apply_all(state: &mut ChatState, events: &[AgentEvent]) -> Vec<Reduction> {
        events
            .iter()
            .map(|event| reduce(state, event, NOW))
            .collect()
    }

    fn contents(state: &ChatState) -> Vec<(Role, &str)> {
        state
            .messages()
            .iter()
            .map(|message| (message.role, message.content.as_str()))
            .collect()
    }

    #[test]
    fn deltas_concatenate_in_delivery_order() {
        let chunks = ["a", "bc", "", "d", " e", "ü"];
        let mut state = submitted("go");
        reduce(&mut state, &start("m"), NOW);
        for chunk in chunks {
            assert_eq!(reduce(&mut state, &delta("m", chunk), NOW), Reduction::Applied);
        }

        assert_eq!(state.messages()[1].content, chunks.concat());
        assert_eq!(state.active_message_id(), Some("m"));
        assert_eq!(state.phase(), TurnPhase::Streaming);
    }

    #[test]
    fn duplicate_start_does_not_open_second_message() {
        let mut state = submitted("go");
        let reductions = apply_all(&mut state, &[start("m1"), start("m2"), start("m1")]);

        assert_eq!(
            reductions,
            vec![
                Reduction::Applied,
                Reduction::Ignored(IgnoreReason::DuplicateStart),
                Reduction::Ignored(IgnoreReason::DuplicateStart),
            ]
        );
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn start_reusing_closed_message_id_is_ignored() {
        let mut state = submitted("go");
        apply_all(&mut state, &[start("m1"), end("m1")]);

        assert_eq!(
            reduce(&mut state, &start("m1"), NOW),
            Reduction::Ignored(IgnoreReason::DuplicateMessageId)
        );
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn start_without_id_gets_generated_fallback() {
        let mut state = submitted("go");
        reduce(&mut state, &AgentEvent::TextMessageStart { message_id: None }, NOW);

        let active = state.active_message().expect("fallback message is active");
        assert!(active.id.starts_with("assistant-"));
        assert_eq!(active.role, Role::Assistant);
        assert_eq!(active.content, "");
        assert_eq!(active.timestamp, NOW);
    }

    #[test]
    fn stray_delta_leaves_every_message_unchanged() {
        let mut state = submitted("go");
        apply_all(&mut state, &[start("m"), delta("m", "kept")]);
        let before = state.clone();

        assert_eq!(
            reduce(&mut state, &delta("other", "ignored"), NOW),
            Reduction::Ignored(IgnoreReason::StaleMessageId)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn delta_before_start_is_dropped() {
        let mut state = submitted("go");
        assert_eq!(
            reduce(&mut state, &delta("m", "early"), NOW),
            Reduction::Ignored(IgnoreReason::StaleMessageId)
        );
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.phase(), TurnPhase::Awaiting);
    }

    #[test]
    fn end_freezes_message_but_keeps_turn_busy() {
        let mut state = submitted("go");
        apply_all(&mut state, &[start("m"), delta("m", "done"), end("m")]);

        assert_eq!(state.active_message_id(), None);
        assert!(state.is_busy());
        assert_eq!(
            reduce(&mut state, &delta("m", " more"), NOW),
            Reduction::Ignored(IgnoreReason::StaleMessageId)
        );
        assert_eq!(state.messages()[1].content, "done");
    }

    #[test]
    fn end_for_other_id_keeps_active_message() {
        let mut state = submitted("go");
        apply_all(&mut state, &[start("m")]);
        assert_eq!(
            reduce(&mut state, &end("x"), NOW),
            Reduction::Ignored(IgnoreReason::StaleMessageId)
        );
        assert_eq!(state.active_message_id(), Some("m"));
    }

    #[test]
    fn run_finished_releases_busy_even_without_end() {
        let mut state = submitted("go");
        apply_all(&mut state, &[start("m"), delta("m", "partial"), AgentEvent::RunFinished]);

        assert!(!state.is_busy());
        assert_eq!(state.active_message_id(), None);
        assert_eq!(reduce(&mut state, &AgentEvent::RunFinished, NOW), Reduction::Applied);
    }

    #[test]
    fn run_error_appends_exactly_one_apology_after_partial_content() {
        let mut state = submitted("go");
        apply_all(
            &mut state,
            &[start("m"), delta("m", "half"), delta("m", " done")],
        );

        let error = AgentEvent::run_error("timeout", None);
        assert_eq!(reduce(&mut state, &error, NOW), Reduction::Applied);
        assert_eq!(
            reduce(&mut state, &error, NOW),
            Reduction::Ignored(IgnoreReason::TurnNotActive)
        );

        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "go"),
                (Role::Assistant, "half done"),
                (Role::Assistant, ERROR_APOLOGY_TEXT),
            ]
        );
        let last = state.messages().last().expect("apology message");
        assert_eq!(last.kind, MessageKind::Error);
        assert!(!state.is_busy());
        assert_eq!(state.active_message_id(), None);
    }

    #[test]
    fn content_events_after_turn_end_are_ignored() {
        let mut state = submitted("go");
        apply_all(&mut state, &[start("m"), AgentEvent::RunFinished]);
        let before = state.clone();

        let reductions = apply_all(&mut state, &[start("late"), delta("m", "late"), end("m")]);
        assert!(reductions
            .iter()
            .all(|reduction| *reduction == Reduction::Ignored(IgnoreReason::TurnNotActive)));
        assert_eq!(state, before);
    }
}
