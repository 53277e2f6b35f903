//! Tracing subscriber setup.
//!
//! Log lines go to stderr so they never interleave with a transcript printed
//! on stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{EnvConfig, DEFAULT_LOG_FILTER};

/// Installs the global subscriber.
///
/// Returns false when a subscriber was already installed.
pub fn init_logging(filter: &str, json: bool) -> bool {
    let filter = build_filter(filter);
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.is_ok()
}

pub fn init_from_config(config: &EnvConfig) -> bool {
    init_logging(&config.log_filter, config.log_json)
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
