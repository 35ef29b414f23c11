//! Integration flows and their shared fixtures.

pub mod correlation;
pub mod flows;

use serde_json::Value;
use shared_types::{Envelope, MessageHeader, MessageType, MessageValue, CURRENT_SCHEMA_VERSION};

/// A valid request envelope calling `function` with `input`.
pub fn request_envelope(function: &str, input: Value) -> Envelope {
    Envelope::new(
        MessageHeader {
            instance_name: Some("acme".into()),
            user_email: Some("ops@acme.io".into()),
            source_service: Some("order-forms".into()),
            schema_version: Some(CURRENT_SCHEMA_VERSION.into()),
            source_function: Some("integrationTest".into()),
            ..Default::default()
        },
        MessageValue {
            message_content: Some(serde_json::json!({
                "functionName": function,
                "functionInput": input,
            })),
            message_type: Some(MessageType::Request),
            conversation_id: Some("conv-42".into()),
            ..Default::default()
        },
    )
}
