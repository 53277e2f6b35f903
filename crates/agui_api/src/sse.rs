use agent_protocol::AgentEvent;
use serde_json::Value;

/// Incremental parser for AG-UI SSE byte streams.
///
/// Bytes are buffered until a blank line closes a frame, so frames and
/// multi-byte characters may be split across arbitrary chunk boundaries.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
    /// Bytes before this offset are known not to start a frame terminator.
    scan_from: usize,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<AgentEvent> {
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer, self.scan_from) {
            let frame: Vec<u8> = self.buffer.drain(0..split + 2).collect();
            self.scan_from = 0;
            if let Some(event) = parse_frame(&frame[..split]) {
                events.push(event);
            }
        }
        // The last byte may be the first half of a terminator.
        self.scan_from = self.buffer.len().saturating_sub(1);

        events
    }

    /// Parse whatever remains once the byte stream has ended.
    ///
    /// A server may close the connection right after the last `data:` line
    /// without the terminating blank line.
    pub fn finish(&mut self) -> Vec<AgentEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scan_from = 0;
        parse_frame(&rest).into_iter().collect()
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<AgentEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|window| window == b"\n\n")
        .map(|position| from + position)
}

fn parse_frame(frame: &[u8]) -> Option<AgentEvent> {
    let frame = String::from_utf8_lossy(frame);
    let payload = extract_data_payload(&frame)?;
    if payload == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<Value>(&payload) {
        Ok(value) => map_event(value),
        Err(error) => {
            tracing::debug!(%error, "skipping malformed SSE data frame");
            None
        }
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: Value) -> Option<AgentEvent> {
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "RUN_STARTED" => Some(AgentEvent::RunStarted {
            thread_id: string_field(&value, "threadId"),
            run_id: string_field(&value, "runId"),
        }),
        "TEXT_MESSAGE_START" => {
            // Only assistant text is rendered; other roles never open a message.
            let role = value.get("role").and_then(Value::as_str);
            if role.is_some_and(|role| role != "assistant") {
                return None;
            }
            Some(AgentEvent::TextMessageStart {
                message_id: string_field(&value, "messageId"),
            })
        }
        "TEXT_MESSAGE_CONTENT" => Some(AgentEvent::TextMessageContent {
            message_id: string_field(&value, "messageId")?,
            delta: string_field(&value, "delta").unwrap_or_default(),
        }),
        "TEXT_MESSAGE_END" => Some(AgentEvent::TextMessageEnd {
            message_id: string_field(&value, "messageId")?,
        }),
        "RUN_FINISHED" => Some(AgentEvent::RunFinished),
        "RUN_ERROR" => Some(AgentEvent::RunError {
            message: string_field(&value, "message")
                .unwrap_or_else(|| "agent run failed".to_string()),
            code: string_field(&value, "code"),
        }),
        other => {
            tracing::trace!(event_type = other, "ignoring unhandled event type");
            None
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
