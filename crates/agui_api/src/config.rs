use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_AGENT_BASE_URL;

/// Transport configuration for agent endpoint requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentApiConfig {
    /// Base URL or full endpoint URL; normalized before each request.
    pub base_url: String,
    /// Optional bearer token passed to `Authorization`.
    pub access_token: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional connect timeout. The stream itself is unbounded here; turn
    /// deadlines belong to the caller.
    pub connect_timeout: Option<Duration>,
}

impl Default for AgentApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            access_token: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            connect_timeout: None,
        }
    }
}

impl AgentApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
