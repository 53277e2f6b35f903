use agui_api::normalize_agent_url;
use agui_api::url::DEFAULT_AGENT_BASE_URL;

#[test]
fn url_normalization_appends_agent_path() {
    assert_eq!(
        normalize_agent_url("http://localhost:8000"),
        "http://localhost:8000/api/v1/agent"
    );
    assert_eq!(
        normalize_agent_url("http://localhost:8000/api/v1/"),
        "http://localhost:8000/api/v1/agent"
    );
}

#[test]
fn url_normalization_keeps_explicit_agent_endpoint() {
    assert_eq!(
        normalize_agent_url("https://agents.example.com/custom/agent/"),
        "https://agents.example.com/custom/agent"
    );
}

#[test]
fn url_normalization_defaults_blank_input() {
    assert_eq!(
        normalize_agent_url("   "),
        format!("{DEFAULT_AGENT_BASE_URL}/api/v1/agent")
    );
}
