//! # Envelope Validation
//!
//! A pure check of `(header, value)`. Runs three steps in order and stops at
//! the first failure:
//!
//! 1. Schema version against the build's compatibility range.
//! 2. Required header fields: `instanceName`, `userEmail`, `sourceService`,
//!    `schemaVersion`.
//! 3. Required value fields: `messageContent` (a JSON object), `messageType`.
//!
//! The envelope is only borrowed; validation never mutates it.

use crate::envelope::{MessageHeader, MessageValue};
use crate::errors::ValidationError;
use crate::schema::{
    Compatibility, SchemaVersion, MAX_COMPATIBLE_SCHEMA_VERSION, MIN_COMPATIBLE_SCHEMA_VERSION,
};
use serde_json::Value;
use tracing::warn;

/// Successful validation, with the schema compatibility class observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    /// Header carried the current schema version.
    Current,
    /// Header carried an older/newer but compatible version.
    CompatibleVersion { received: String },
}

impl Validated {
    /// True when validation passed with a compatibility warning.
    pub fn has_warning(&self) -> bool {
        matches!(self, Validated::CompatibleVersion { .. })
    }
}

/// Outcome of [`EnvelopeValidator::validate`].
pub type ValidationResult = Result<Validated, ValidationError>;

/// Stateless envelope validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeValidator;

impl EnvelopeValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate an envelope.
    pub fn validate(&self, header: &MessageHeader, value: &MessageValue) -> ValidationResult {
        let validated = Self::check_schema_version(header)?;
        Self::check_header_fields(header)?;
        Self::check_value_fields(value)?;
        Ok(validated)
    }

    fn check_schema_version(header: &MessageHeader) -> ValidationResult {
        // An absent version is reported as a missing header field by step 2.
        let Some(received) = non_empty(header.schema_version.as_deref()) else {
            return Ok(Validated::Current);
        };

        let version: SchemaVersion =
            received
                .parse()
                .map_err(|_| ValidationError::MalformedSchemaVersion {
                    received: received.to_string(),
                })?;

        match version.compatibility() {
            Compatibility::Current => Ok(Validated::Current),
            Compatibility::Compatible => {
                warn!(
                    received = received,
                    current = %SchemaVersion::current(),
                    source_service = header.source_service.as_deref().unwrap_or_default(),
                    "Accepting envelope with non-current but compatible schema version"
                );
                Ok(Validated::CompatibleVersion {
                    received: received.to_string(),
                })
            }
            Compatibility::Incompatible => Err(ValidationError::SchemaVersion {
                received: received.to_string(),
                min: MIN_COMPATIBLE_SCHEMA_VERSION.to_string(),
                max: MAX_COMPATIBLE_SCHEMA_VERSION.to_string(),
            }),
        }
    }

    fn check_header_fields(header: &MessageHeader) -> Result<(), ValidationError> {
        let required = [
            ("instanceName", &header.instance_name),
            ("userEmail", &header.user_email),
            ("sourceService", &header.source_service),
            ("schemaVersion", &header.schema_version),
        ];
        match required
            .iter()
            .find(|(_, v)| non_empty(v.as_deref()).is_none())
        {
            Some((field, _)) => Err(ValidationError::MissingHeaderField { field: *field }),
            None => Ok(()),
        }
    }

    fn check_value_fields(value: &MessageValue) -> Result<(), ValidationError> {
        // Content is an open key/value map; scalars and arrays count as absent.
        if !matches!(value.message_content, Some(Value::Object(_))) {
            return Err(ValidationError::MissingValueField {
                field: "messageContent",
            });
        }
        match &value.message_type {
            Some(t) if !t.as_str().is_empty() => Ok(()),
            _ => Err(ValidationError::MissingValueField {
                field: "messageType",
            }),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
