//! Correlation error types.

use std::time::Duration;
use thiserror::Error;

/// Reasons an outbound `send()` produced no reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// No matching reply arrived in time.
    #[error("request {request_id} timed out after {}ms", timeout.as_millis())]
    Timeout {
        request_id: String,
        timeout: Duration,
    },

    /// Nothing was listening on the request topic.
    #[error("publish to {topic} reached no subscribers")]
    PublishFailed { topic: String },

    /// The pending entry was dropped without a reply.
    #[error("response channel closed for request {request_id}")]
    ResponseChannelClosed { request_id: String },
}

impl CorrelationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CorrelationError::Timeout { .. })
    }
}
