//! # Router Configuration
//!
//! Runtime parameters read from environment variables. Every field has a
//! default; unparsable values fall back to the default with a warning.
//!
//! Schema-version constants are compiled into `shared-types` and are not
//! configurable here.

use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default service identity.
pub const DEFAULT_SERVICE_ID: &str = "process-router";

/// Default `send()` timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Complete router configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// This process's service identity.
    pub service_id: String,
    /// Logical channel consumed for inbound dispatch.
    pub inbound_channel: String,
    /// Default wait for correlated replies.
    pub request_timeout: Duration,
    /// In-memory bus buffer per subscriber.
    pub bus_capacity: usize,
    /// Log filter directive.
    pub log_level: String,
    /// Emit JSON formatted logs.
    pub json_logs: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            service_id: DEFAULT_SERVICE_ID.to_string(),
            inbound_channel: DEFAULT_SERVICE_ID.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("service id must not be empty (set PR_SERVICE_ID)")]
    EmptyServiceId,
    #[error("inbound channel must not be empty (set PR_INBOUND_CHANNEL)")]
    EmptyInboundChannel,
    #[error("request timeout must be greater than zero (set PR_REQUEST_TIMEOUT_MS)")]
    ZeroTimeout,
}

impl RouterConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PR_SERVICE_ID`: Service identity (default: process-router)
    /// - `PR_INBOUND_CHANNEL`: Inbound channel (default: the service id)
    /// - `PR_REQUEST_TIMEOUT_MS`: Correlated request timeout (default: 5000)
    /// - `PR_BUS_CAPACITY`: Bus buffer per subscriber (default: 1000)
    /// - `PR_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `PR_JSON_LOGS`: JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        let service_id = lookup("PR_SERVICE_ID").unwrap_or(defaults.service_id);
        let inbound_channel = lookup("PR_INBOUND_CHANNEL").unwrap_or_else(|| service_id.clone());

        Self {
            request_timeout: parse_or(&lookup, "PR_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),

            bus_capacity: parse_or(&lookup, "PR_BUS_CAPACITY", defaults.bus_capacity)
                .unwrap_or(defaults.bus_capacity),

            log_level: lookup("PR_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("PR_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            service_id,
            inbound_channel,
        }
    }

    /// Reject configurations the runtime cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_id.trim().is_empty() {
            return Err(ConfigError::EmptyServiceId);
        }
        if self.inbound_channel.trim().is_empty() {
            return Err(ConfigError::EmptyInboundChannel);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return Some(default);
    };
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key = key, value = %raw, "Invalid configuration value, using default");
            None
        }
    }
}
