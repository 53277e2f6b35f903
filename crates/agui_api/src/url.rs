/// Default endpoint for a locally served agent.
pub const DEFAULT_AGENT_BASE_URL: &str = "http://localhost:8000";

/// Normalize a base URL to the agent streaming endpoint.
///
/// Normalization rules:
/// 1) keep `/agent` unchanged
/// 2) append `/agent` when path ends in `/api/v1`
/// 3) append `/api/v1/agent` otherwise
pub fn normalize_agent_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_AGENT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/agent") {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/api/v1") {
        return format!("{trimmed}/agent");
    }
    format!("{trimmed}/api/v1/agent")
}
