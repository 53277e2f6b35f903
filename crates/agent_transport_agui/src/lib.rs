//! AG-UI endpoint-backed implementation of the shared `agent_protocol` contract.
//!
//! This adapter drives one `agui_api` stream per turn on the calling worker
//! thread and forwards events as they arrive. Transport failures become
//! `Err` so the session controller can apply its single failure path.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agent_protocol::{
    AgentEvent, AgentTransport, CancelSignal, TransportInitError, TransportProfile, TurnRequest,
};
use agui_api::{AgentApiClient, AgentApiConfig, AgentApiError, RunAgentInput};

/// Stable transport identifier used by startup selection.
pub const AGUI_TRANSPORT_ID: &str = "agui";

/// Runtime configuration for the AG-UI transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AguiTransportConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl AguiTransportConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_token: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> AgentApiConfig {
        let mut config = AgentApiConfig::new(self.endpoint);

        if let Some(token) = self.access_token {
            config = config.with_access_token(token);
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn endpoint(&self) -> String;

    fn stream(
        &self,
        input: &RunAgentInput,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<Option<AgentEvent>, AgentApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: AgentApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn endpoint(&self) -> String {
        self.client.normalized_endpoint()
    }

    fn stream(
        &self,
        input: &RunAgentInput,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<Option<AgentEvent>, AgentApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                AgentApiError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(input, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `AgentTransport` adapter backed by `agui_api` transport primitives.
pub struct AguiTransport {
    stream_client: Arc<dyn StreamClient>,
}

impl AguiTransport {
    /// Creates a transport using a real HTTP client.
    pub fn new(config: AguiTransportConfig) -> Result<Self, TransportInitError> {
        let client = AgentApiClient::new(config.into_api_config()).map_err(map_init_error)?;
        Ok(Self {
            stream_client: Arc::new(DefaultStreamClient { client }),
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(stream_client: Arc<dyn StreamClient>) -> Self {
        Self { stream_client }
    }
}

impl AgentTransport for AguiTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: AGUI_TRANSPORT_ID.to_string(),
            endpoint: self.stream_client.endpoint(),
        }
    }

    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(AgentEvent),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;

        if cancel.load(Ordering::Acquire) {
            return Ok(());
        }

        let input = RunAgentInput::from(req);
        tracing::debug!(
            turn_id,
            run_id = %input.run_id,
            history = input.messages.len(),
            "opening agent stream"
        );

        match self.stream_client.stream(&input, &cancel, emit) {
            Ok(Some(_terminal)) => Ok(()),
            Ok(None) => Err("agent stream ended without a terminal event".to_string()),
            Err(error) if error.is_cancelled() => {
                tracing::debug!(turn_id, "agent stream cancelled");
                Ok(())
            }
            Err(error) => Err(format!("agent request failed: {error}")),
        }
    }
}

fn map_init_error(error: AgentApiError) -> TransportInitError {
    TransportInitError::new(format!("Failed to initialize agui transport: {error}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Mutex, MutexGuard};

    use agent_protocol::{HistoryMessage, Role};
    use pretty_assertions::assert_eq;

    use super::*;

    enum FakeStreamOutcome {
        Success(Vec<AgentEvent>),
        Error(AgentApiError),
    }

    struct FakeStreamClient {
        observed_input: Mutex<Option<RunAgentInput>>,
        outcome: Mutex<Option<FakeStreamOutcome>>,
    }

    impl FakeStreamClient {
        fn success(events: Vec<AgentEvent>) -> Arc<Self> {
            Arc::new(Self {
                observed_input: Mutex::new(None),
                outcome: Mutex::new(Some(FakeStreamOutcome::Success(events))),
            })
        }

        fn failure(error: AgentApiError) -> Arc<Self> {
            Arc::new(Self {
                observed_input: Mutex::new(None),
                outcome: Mutex::new(Some(FakeStreamOutcome::Error(error))),
            })
        }

        fn observed_input(&self) -> Option<RunAgentInput> {
            lock_unpoisoned(&self.observed_input).clone()
        }
    }

    impl StreamClient for FakeStreamClient {
        fn endpoint(&self) -> String {
            "http://fake/api/v1/agent".to_string()
        }

        fn stream(
            &self,
            input: &RunAgentInput,
            _cancel: &CancelSignal,
            on_event: &mut dyn FnMut(AgentEvent),
        ) -> Result<Option<AgentEvent>, AgentApiError> {
            *lock_unpoisoned(&self.observed_input) = Some(input.clone());

            match lock_unpoisoned(&self.outcome).take() {
                Some(FakeStreamOutcome::Success(events)) => {
                    let mut terminal = None;
                    for event in events {
                        if event.is_terminal() {
                            terminal = Some(event.clone());
                        }
                        on_event(event);
                    }
                    Ok(terminal)
                }
                Some(FakeStreamOutcome::Error(error)) => Err(error),
                None => panic!("fake stream outcome should be consumed exactly once"),
            }
        }
    }

    fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn request() -> TurnRequest {
        TurnRequest {
            turn_id: 9,
            thread_id: "thread".to_string(),
            run_id: "run".to_string(),
            messages: vec![HistoryMessage {
                id: "1".to_string(),
                role: Role::User,
                content: "hello".to_string(),
            }],
            tools: Vec::new(),
        }
    }

    fn run_turn(transport: &AguiTransport) -> (Result<(), String>, Vec<AgentEvent>) {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut events = Vec::new();
        let result = transport.run(request(), cancel, &mut |event| events.push(event));
        (result, events)
    }

    #[test]
    fn profile_reports_agui_transport_id_and_endpoint() {
        let transport =
            AguiTransport::with_stream_client_for_tests(FakeStreamClient::success(Vec::new()));
        let profile = transport.profile();
        assert_eq!(profile.transport_id, AGUI_TRANSPORT_ID);
        assert_eq!(profile.endpoint, "http://fake/api/v1/agent");
    }

    #[test]
    fn run_forwards_events_and_replays_history() {
        let stream = FakeStreamClient::success(vec![
            AgentEvent::TextMessageStart {
                message_id: Some("a1".to_string()),
            },
            AgentEvent::TextMessageContent {
                message_id: "a1".to_string(),
                delta: "Hi".to_string(),
            },
            AgentEvent::RunFinished,
        ]);
        let transport =
            AguiTransport::with_stream_client_for_tests(Arc::clone(&stream) as Arc<dyn StreamClient>);

        let (result, events) = run_turn(&transport);

        assert_eq!(result, Ok(()));
        assert_eq!(events.len(), 3);
        let input = stream.observed_input().expect("stream should see input");
        assert_eq!(input.thread_id, "thread");
        assert_eq!(input.messages[0].content, "hello");
        assert!(input.tools.is_empty());
    }

    #[test]
    fn run_reports_missing_terminal_event_as_failure() {
        let stream = FakeStreamClient::success(vec![AgentEvent::TextMessageStart {
            message_id: None,
        }]);
        let transport = AguiTransport::with_stream_client_for_tests(stream);

        let (result, events) = run_turn(&transport);

        assert_eq!(events.len(), 1);
        assert!(result.is_err_and(|error| error.contains("without a terminal event")));
    }

    #[test]
    fn run_maps_transport_error_to_failure() {
        let stream = FakeStreamClient::failure(AgentApiError::Runtime("boom".to_string()));
        let transport = AguiTransport::with_stream_client_for_tests(stream);

        let (result, events) = run_turn(&transport);

        assert!(events.is_empty());
        assert!(result.is_err_and(|error| error.contains("boom")));
    }

    #[test]
    fn run_treats_cancellation_as_quiet_exit() {
        let stream = FakeStreamClient::failure(AgentApiError::Cancelled);
        let transport = AguiTransport::with_stream_client_for_tests(stream);

        let (result, events) = run_turn(&transport);

        assert_eq!(result, Ok(()));
        assert!(events.is_empty());
    }

    #[test]
    fn new_rejects_invalid_endpoint() {
        let error = match AguiTransport::new(AguiTransportConfig::new("ftp://nowhere")) {
            Ok(_) => panic!("invalid endpoint should fail"),
            Err(error) => error,
        };
        assert!(error.message().contains("invalid endpoint"));
    }
}
