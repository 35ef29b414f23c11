//! # Message Envelope
//!
//! The `(header, value)` pair exchanged over the bus.
//!
//! ## Wire Shape
//!
//! ```text
//! {
//!   "header": { "instanceName", "userEmail", "sourceService", "schemaVersion",
//!               "destinationService"?, "requestId"?, "responseId"?, ... },
//!   "value":  { "messageContent", "messageType",
//!               "projectId"?, "assetId"?, "conversationId"?, "error"?, ... }
//! }
//! ```
//!
//! Header and value fields are deserialized leniently (every field optional)
//! so that an envelope missing a required field still decodes and can be
//! rejected by the validator with a precise error. Required-field presence is
//! enforced in [`crate::validation`], never by serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Metadata accompanying every envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageHeader {
    /// Tenant / organisation identifier. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    /// Acting user. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Producing process. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_service: Option<String>,
    /// Dotted schema version. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Addressed service; absent means unaddressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_service: Option<String>,
    /// Producer-assigned request identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Responder-assigned identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Transport-level correlation token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
}

/// Kind of producer that emitted an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    System,
    Service,
}

/// The payload half of an envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageValue {
    /// Open key/value content. Required.
    pub message_content: Option<Value>,
    /// Message kind. Required.
    pub message_type: Option<MessageType>,
    /// Propagated unchanged from request to response; `null` when absent.
    pub project_id: Option<String>,
    pub asset_id: Option<String>,
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_status: Option<String>,
}

impl MessageValue {
    /// Fetch a string field out of `messageContent`.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.message_content.as_ref()?.get(key)?.as_str()
    }

    /// Returns true if this value reports an error.
    pub fn is_error(&self) -> bool {
        self.error == Some(true) || self.message_type == Some(MessageType::ErrorResponse)
    }
}

/// `messageType` values. Application-defined types round-trip through
/// [`MessageType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Request,
    Response,
    ErrorResponse,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Request => "REQUEST",
            MessageType::Response => "RESPONSE",
            MessageType::ErrorResponse => "ERROR_RESPONSE",
            MessageType::Other(s) => s,
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "REQUEST" => MessageType::Request,
            "RESPONSE" => MessageType::Response,
            "ERROR_RESPONSE" => MessageType::ErrorResponse,
            _ => MessageType::Other(s),
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete bus message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub header: MessageHeader,
    #[serde(default)]
    pub value: MessageValue,
}

/// Failure to turn a raw bus payload into an [`Envelope`].
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The broker delivered a null value.
    #[error("empty message payload")]
    Empty,
    /// The payload is not a JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

impl Envelope {
    pub fn new(header: MessageHeader, value: MessageValue) -> Self {
        Self { header, value }
    }

    /// Decode a raw bus payload.
    pub fn from_payload(payload: Option<&Value>) -> Result<Self, DecodeError> {
        let raw = match payload {
            None | Some(Value::Null) => return Err(DecodeError::Empty),
            Some(raw) => raw,
        };
        if !raw.is_object() {
            return Err(DecodeError::Malformed("payload is not a JSON object".into()));
        }
        serde_json::from_value(raw.clone()).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Best-effort header recovery from a payload that failed to decode.
    ///
    /// Picks out whichever string header fields are present so an error reply
    /// can still be addressed.
    pub fn salvage_header(payload: Option<&Value>) -> MessageHeader {
        let header = payload.and_then(|p| p.get("header"));
        let field = |name: &str| -> Option<String> {
            header?.get(name)?.as_str().map(str::to_string)
        };
        MessageHeader {
            instance_name: field("instanceName"),
            user_email: field("userEmail"),
            source_service: field("sourceService"),
            schema_version: field("schemaVersion"),
            destination_service: field("destinationService"),
            request_id: field("requestId"),
            response_id: field("responseId"),
            correlation_id: field("correlationId"),
            source_function: field("sourceFunction"),
            source_type: None,
            user_role: field("userRole"),
        }
    }

    /// Encode for publishing on the bus.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Lightweight status payload used for the routing short-circuit.
///
/// Deliberately not an envelope: it carries no header and is not an
/// `ERROR_RESPONSE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub message_status: String,
    pub error_message: String,
}

impl StatusPayload {
    pub fn not_intended_for_this_service() -> Self {
        Self {
            message_status: "error".into(),
            error_message: "not intended for this service".into(),
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
