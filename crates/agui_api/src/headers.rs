use std::collections::BTreeMap;

use crate::config::AgentApiConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_CACHE_CONTROL: &str = "cache-control";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for agent endpoint requests.
///
/// Extra headers are lowercased and applied last, so they may override the
/// defaults.
pub fn build_headers(config: &AgentApiConfig, user_agent: Option<&str>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );
    headers.insert(HEADER_CACHE_CONTROL.to_owned(), "no-cache".to_owned());

    if let Some(token) = config
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {token}"));
    }

    let ua = match (user_agent, config.user_agent.as_deref()) {
        (Some(explicit), _) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        (_, Some(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

fn default_user_agent() -> String {
    format!(
        "agui_chat/{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
