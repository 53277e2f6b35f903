use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use agent_protocol::AgentEvent;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};

use crate::config::AgentApiConfig;
use crate::error::{parse_error_message, AgentApiError};
use crate::headers::build_headers;
use crate::payload::RunAgentInput;
use crate::sse::SseStreamParser;
use crate::url::normalize_agent_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct AgentApiClient {
    http: Client,
    config: AgentApiConfig,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<AgentEvent>,
    pub terminal: Option<AgentEvent>,
}

impl AgentApiClient {
    pub fn new(config: AgentApiConfig) -> Result<Self, AgentApiError> {
        let endpoint = normalize_agent_url(&config.base_url);
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AgentApiError::InvalidEndpoint(endpoint));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AgentApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_agent_url(&self.config.base_url)
    }

    pub fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, AgentApiError> {
        let headers = build_headers(&self.config, user_agent);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| AgentApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    AgentApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        input: &RunAgentInput,
    ) -> Result<reqwest::RequestBuilder, AgentApiError> {
        if input.messages.is_empty() {
            return Err(AgentApiError::Runtime(
                "run input must carry at least one message".to_string(),
            ));
        }

        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(input))
    }

    /// Sends the run request once and validates that an event stream came back.
    pub async fn send(
        &self,
        input: &RunAgentInput,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, AgentApiError> {
        if is_cancelled(cancellation) {
            return Err(AgentApiError::Cancelled);
        }

        let response = await_or_cancel(self.build_request(input)?.send(), cancellation).await??;
        let status = response.status();

        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();
            return Err(AgentApiError::Status {
                status,
                message: parse_error_message(status, &body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase());
        match content_type {
            Some(content_type) if !content_type.starts_with("text/event-stream") => {
                let body = await_or_cancel(response.text(), cancellation)
                    .await?
                    .unwrap_or_default();
                Err(AgentApiError::UnexpectedContentType {
                    content_type,
                    message: parse_error_message(status, &body),
                })
            }
            _ => Ok(response),
        }
    }

    /// Streams one run, invoking `on_event` for every event in arrival order.
    ///
    /// Returns the terminal event when one was observed. Reading stops at the
    /// first terminal event.
    pub async fn stream_with_handler<F>(
        &self,
        input: &RunAgentInput,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<Option<AgentEvent>, AgentApiError>
    where
        F: FnMut(AgentEvent),
    {
        let response = self.send(input, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            let chunk = chunk?;
            for event in parser.feed(&chunk) {
                if let Some(terminal) = process_stream_event(event, &mut on_event) {
                    return Ok(Some(terminal));
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(AgentApiError::Cancelled);
        }

        for event in parser.finish() {
            if let Some(terminal) = process_stream_event(event, &mut on_event) {
                return Ok(Some(terminal));
            }
        }

        Ok(None)
    }

    pub async fn stream(
        &self,
        input: &RunAgentInput,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, AgentApiError> {
        let mut events = Vec::new();
        let terminal = self
            .stream_with_handler(input, cancellation, |event| {
                events.push(event);
            })
            .await?;

        Ok(StreamResult { events, terminal })
    }
}

fn process_stream_event<F>(event: AgentEvent, on_event: &mut F) -> Option<AgentEvent>
where
    F: FnMut(AgentEvent),
{
    let terminal = event.is_terminal().then(|| event.clone());
    on_event(event);
    terminal
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, AgentApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(AgentApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(AgentApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
