//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::WorkerError;

/// Builds the log filter: `RUST_LOG` wins over the configured level
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the global tracing subscriber for structured logging
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(log_level: &str) -> Result<(), WorkerError> {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| WorkerError::Telemetry(e.to_string()))
}
