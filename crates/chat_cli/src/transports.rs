use std::sync::Arc;
use std::time::Duration;

use agent_transport_agui::{AguiTransport, AguiTransportConfig};
use agent_transport_mock::MockTransport;
use agui_chat::{AgentTransport, EnvConfig, TransportInitError, TransportKind};

const MOCK_TOKEN_DELAY: Duration = Duration::from_millis(30);

pub fn transport_from_config(
    config: &EnvConfig,
) -> Result<Arc<dyn AgentTransport>, TransportInitError> {
    match config.transport {
        TransportKind::Mock => Ok(Arc::new(MockTransport::echo(MOCK_TOKEN_DELAY))),
        TransportKind::Agui => {
            let mut transport_config = AguiTransportConfig::new(config.endpoint.clone());
            if let Some(token) = &config.access_token {
                transport_config = transport_config.with_access_token(token.clone());
            }
            if let Some(timeout) = config.request_timeout {
                transport_config = transport_config.with_connect_timeout(timeout);
            }
            Ok(Arc::new(AguiTransport::new(transport_config)?))
        }
    }
}
