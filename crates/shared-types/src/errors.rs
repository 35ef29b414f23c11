//! # Error Types
//!
//! Validation failures shared by every consumer of the envelope schema.

use thiserror::Error;

/// Reasons an envelope is rejected by the validator.
///
/// Every variant is fatal for the message it describes and is answered with
/// an `ERROR_RESPONSE` envelope; none of them is fatal for the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Received version is outside the compatible range.
    #[error("Unsupported schema version {received}: compatible range is {min} to {max}")]
    SchemaVersion {
        received: String,
        min: String,
        max: String,
    },

    /// Received version is not a dotted `N.N.N` string.
    #[error("Malformed schema version: {received:?}")]
    MalformedSchemaVersion { received: String },

    /// A required header field is absent or empty.
    #[error("Missing required header field: {field}")]
    MissingHeaderField { field: &'static str },

    /// A required value field is absent or empty.
    #[error("Missing required value field: {field}")]
    MissingValueField { field: &'static str },
}

impl ValidationError {
    /// Stable code carried in the error envelope's `errorCode`.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::SchemaVersion { .. }
            | ValidationError::MalformedSchemaVersion { .. } => "SCHEMA_VERSION_ERROR",
            ValidationError::MissingHeaderField { .. } => "MISSING_HEADER_FIELD",
            ValidationError::MissingValueField { .. } => "MISSING_VALUE_FIELD",
        }
    }

    /// The offending field, for missing-field errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::MissingHeaderField { field }
            | ValidationError::MissingValueField { field } => Some(*field),
            _ => None,
        }
    }
}
