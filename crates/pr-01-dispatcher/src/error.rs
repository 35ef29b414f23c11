//! Dispatch-boundary error taxonomy.
//!
//! Every variant here becomes an `ERROR_RESPONSE` envelope. Soft errors
//! (routing mismatch, unknown function) are not errors at this level and are
//! answered with ordinary content instead.

use shared_types::{DecodeError, ValidationError};
use thiserror::Error;

/// Hard failures converted into error envelopes by the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Payload was null or not an envelope.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Envelope failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The resolved handler returned an error.
    #[error("{message}")]
    HandlerExecution {
        function: String,
        message: String,
        trace: Option<String>,
    },

    /// The resolved handler panicked.
    #[error("Function {function} panicked: {message}")]
    HandlerPanicked { function: String, message: String },
}

impl DispatchError {
    /// Build from a handler's `anyhow` error, keeping the cause chain as trace.
    pub fn handler(function: impl Into<String>, err: &anyhow::Error) -> Self {
        let trace = (err.chain().count() > 1).then(|| format!("{err:?}"));
        DispatchError::HandlerExecution {
            function: function.into(),
            message: err.to_string(),
            trace,
        }
    }

    /// Stable code carried in the error envelope's `errorCode`.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Decode(_) => "DECODE_ERROR",
            DispatchError::Validation(e) => e.code(),
            DispatchError::HandlerExecution { .. } | DispatchError::HandlerPanicked { .. } => {
                "HANDLER_EXECUTION_ERROR"
            }
        }
    }

    /// Optional trace rendered as `errorStack`.
    pub fn trace(&self) -> Option<&str> {
        match self {
            DispatchError::HandlerExecution { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}
