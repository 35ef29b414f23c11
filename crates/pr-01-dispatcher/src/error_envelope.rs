//! # Reply Envelopes
//!
//! [`ErrorEnvelopeBuilder`] turns any dispatch failure into a standard
//! `ERROR_RESPONSE` envelope. The header rules are shared with successful
//! responses:
//!
//! | Field | Value |
//! |-------|-------|
//! | `instanceName`, `userEmail`, `userRole` | copied from the inbound header |
//! | `schemaVersion` | this build's current version |
//! | `sourceService` | this process's identity |
//! | `destinationService` | inbound `sourceService` |
//! | `requestId` | echoed, or `Not-Sent-<ts>` |
//! | `correlationId` | echoed |

use crate::error::DispatchError;
use serde_json::{json, Value};
use shared_types::{
    Envelope, IdGenerator, MessageHeader, MessageType, MessageValue, SchemaVersion, SourceType,
};
use std::sync::Arc;

/// Header for a reply to `inbound`, leaving `responseId` to the caller.
pub(crate) fn reply_header(
    service_id: &str,
    ids: &IdGenerator,
    inbound: &MessageHeader,
    response_id: String,
    source_type: SourceType,
) -> MessageHeader {
    MessageHeader {
        instance_name: inbound.instance_name.clone(),
        user_email: inbound.user_email.clone(),
        source_service: Some(service_id.to_string()),
        schema_version: Some(SchemaVersion::current().to_string()),
        destination_service: inbound.source_service.clone(),
        request_id: Some(
            inbound
                .request_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ids.not_sent_id()),
        ),
        response_id: Some(response_id),
        correlation_id: inbound.correlation_id.clone(),
        source_function: inbound.source_function.clone(),
        source_type: Some(source_type),
        user_role: inbound.user_role.clone(),
    }
}

/// Value skeleton for a reply, carrying the propagated ids.
pub(crate) fn reply_value(
    inbound: Option<&MessageValue>,
    message_type: MessageType,
    content: Value,
) -> MessageValue {
    MessageValue {
        message_content: Some(content),
        message_type: Some(message_type),
        project_id: inbound.and_then(|v| v.project_id.clone()),
        asset_id: inbound.and_then(|v| v.asset_id.clone()),
        conversation_id: inbound.and_then(|v| v.conversation_id.clone()),
        ..Default::default()
    }
}

/// Builds standardized error envelopes.
#[derive(Debug, Clone)]
pub struct ErrorEnvelopeBuilder {
    service_id: String,
    ids: Arc<IdGenerator>,
}

impl ErrorEnvelopeBuilder {
    pub fn new(service_id: impl Into<String>, ids: Arc<IdGenerator>) -> Self {
        Self {
            service_id: service_id.into(),
            ids,
        }
    }

    /// Build an `ERROR_RESPONSE` for `error` raised while handling the
    /// inbound envelope. `inbound_value` is `None` when the payload could not
    /// be decoded.
    pub fn build(
        &self,
        inbound_header: &MessageHeader,
        inbound_value: Option<&MessageValue>,
        error: &DispatchError,
    ) -> Envelope {
        let response_id = self.ids.error_id(&self.service_id);
        let header = reply_header(
            &self.service_id,
            &self.ids,
            inbound_header,
            response_id,
            SourceType::System,
        );

        let message = error.to_string();
        let mut content = json!({ "errorMessage": message });
        if let Some(trace) = error.trace() {
            content["errorStack"] = Value::String(trace.to_string());
        }

        let mut value = reply_value(inbound_value, MessageType::ErrorResponse, content);
        value.error = Some(true);
        value.error_code = Some(error.code().to_string());
        value.error_message = Some(message);

        Envelope::new(header, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{TimeSource, ValidationError, CURRENT_SCHEMA_VERSION};

    struct FixedClock;

    impl TimeSource for FixedClock {
        fn now_millis(&self) -> u64 {
            1_000
        }
    }

    fn builder() -> ErrorEnvelopeBuilder {
        ErrorEnvelopeBuilder::new("process-router", Arc::new(IdGenerator::new(Arc::new(FixedClock))))
    }

    fn inbound_header() -> MessageHeader {
        MessageHeader {
            instance_name: Some("acme".into()),
            user_email: Some("buyer@acme.io".into()),
            source_service: Some("order-forms".into()),
            schema_version: Some("0.1.0".into()),
            request_id: Some("RQ-suggest-99".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_header_rules() {
        let err = DispatchError::Validation(ValidationError::SchemaVersion {
            received: "0.1.0".into(),
            min: "0.1.2".into(),
            max: "0.2.5".into(),
        });
        let envelope = builder().build(&inbound_header(), None, &err);
        let h = &envelope.header;

        assert_eq!(h.instance_name.as_deref(), Some("acme"));
        assert_eq!(h.user_email.as_deref(), Some("buyer@acme.io"));
        assert_eq!(h.schema_version.as_deref(), Some(CURRENT_SCHEMA_VERSION));
        assert_eq!(h.source_service.as_deref(), Some("process-router"));
        assert_eq!(h.destination_service.as_deref(), Some("order-forms"));
        assert_eq!(h.source_type, Some(SourceType::System));
        assert_eq!(h.request_id.as_deref(), Some("RQ-suggest-99"));
        assert_eq!(h.response_id.as_deref(), Some("ERR-process-router-1000"));
    }

    #[test]
    fn test_value_rules() {
        let inbound_value = MessageValue {
            conversation_id: Some("conv-7".into()),
            project_id: Some("proj-1".into()),
            ..Default::default()
        };
        let err = DispatchError::HandlerExecution {
            function: "createTicket".into(),
            message: "Jira unavailable".into(),
            trace: Some("Jira unavailable\n\nCaused by: timeout".into()),
        };
        let envelope = builder().build(&inbound_header(), Some(&inbound_value), &err);
        let v = &envelope.value;

        assert_eq!(v.message_type, Some(MessageType::ErrorResponse));
        assert_eq!(v.error, Some(true));
        assert_eq!(v.error_code.as_deref(), Some("HANDLER_EXECUTION_ERROR"));
        assert_eq!(v.content_str("errorMessage"), Some("Jira unavailable"));
        assert!(v.content_str("errorStack").unwrap().contains("timeout"));
        assert_eq!(v.conversation_id.as_deref(), Some("conv-7"));
        assert_eq!(v.project_id.as_deref(), Some("proj-1"));
        assert_eq!(v.asset_id, None);
    }

    #[test]
    fn test_missing_request_id_synthesized() {
        let mut header = inbound_header();
        header.request_id = None;
        let err = DispatchError::Decode(shared_types::DecodeError::Empty);
        let envelope = builder().build(&header, None, &err);
        let request_id = envelope.header.request_id.unwrap();
        assert!(request_id.starts_with("Not-Sent-"), "{request_id}");
        assert!(envelope.value.content_str("errorStack").is_none());
    }
}
