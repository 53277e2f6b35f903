use agent_protocol::{HistoryMessage, ToolDefinition, TurnRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body accepted by AG-UI compatible agent endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    pub thread_id: String,
    pub run_id: String,
    #[serde(default = "empty_object")]
    pub state: Value,
    pub messages: Vec<HistoryMessage>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub context: Vec<Value>,
    #[serde(default = "empty_object")]
    pub forwarded_props: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl RunAgentInput {
    pub fn new(
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
        messages: Vec<HistoryMessage>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            state: empty_object(),
            messages,
            tools: Vec::new(),
            context: Vec::new(),
            forwarded_props: empty_object(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

impl From<TurnRequest> for RunAgentInput {
    fn from(request: TurnRequest) -> Self {
        Self::new(request.thread_id, request.run_id, request.messages).with_tools(request.tools)
    }
}
