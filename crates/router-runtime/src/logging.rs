//! Structured logging setup.

use crate::config::RouterConfig;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Build the filter from the configured level, falling back to `info`.
pub fn env_filter(config: &RouterConfig) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| LoggingError::InvalidFilter {
        filter: config.log_level.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber. JSON output for containers, compact
/// human-readable output otherwise.
pub fn init_logging(config: &RouterConfig) -> Result<(), LoggingError> {
    let env_filter = env_filter(config)?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;
    }

    tracing::info!(
        service_id = %config.service_id,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}
