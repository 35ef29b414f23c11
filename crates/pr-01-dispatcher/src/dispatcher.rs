//! # Inbound Dispatcher
//!
//! Turns one inbound envelope into exactly one outbound reply.
//!
//! ```text
//! RECEIVED ──validate──→ VALIDATED ──route-check──→ ROUTED ──handler──→ COMPLETED
//!     │                      │                         │
//!     │ invalid              │ addressed elsewhere     │ handler error / panic
//!     ▼                      ▼                         ▼
//!   FAILED          (status payload, no envelope)    FAILED
//! ```
//!
//! Validation failures and handler failures are hard errors answered with an
//! `ERROR_RESPONSE`. An unknown function name is a soft error answered with
//! an ordinary `RESPONSE` whose content carries `errorMessage`. A destination
//! mismatch short-circuits with a bare [`StatusPayload`].
//!
//! No retries and no timeout are applied to handlers here.

use crate::error::DispatchError;
use crate::error_envelope::{reply_header, reply_value, ErrorEnvelopeBuilder};
use crate::registry::{FunctionRegistry, InboundContext};
use futures::FutureExt;
use serde_json::{json, Value};
use shared_types::{
    Envelope, EnvelopeValidator, IdGenerator, MessageHeader, MessageType, MessageValue,
    SourceType, StatusPayload,
};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Key in `messageContent` naming the function to invoke.
pub const FUNCTION_NAME_KEY: &str = "functionName";

/// Key in `messageContent` carrying the handler input.
pub const FUNCTION_INPUT_KEY: &str = "functionInput";

/// Dispatch lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Validated,
    Routed,
    Completed,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchState::Received => "RECEIVED",
            DispatchState::Validated => "VALIDATED",
            DispatchState::Routed => "ROUTED",
            DispatchState::Completed => "COMPLETED",
            DispatchState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A `RESPONSE` envelope, including soft errors such as unknown functions.
    Completed(Envelope),
    /// An `ERROR_RESPONSE` envelope.
    Failed(Envelope),
    /// The envelope was addressed to another service; no handler ran.
    NotAddressed(StatusPayload),
}

impl DispatchOutcome {
    /// State the dispatcher stopped in.
    pub fn state(&self) -> DispatchState {
        match self {
            DispatchOutcome::Completed(_) => DispatchState::Completed,
            DispatchOutcome::Failed(_) => DispatchState::Failed,
            DispatchOutcome::NotAddressed(_) => DispatchState::Validated,
        }
    }

    /// The reply envelope, unless the routing check short-circuited.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            DispatchOutcome::Completed(e) | DispatchOutcome::Failed(e) => Some(e),
            DispatchOutcome::NotAddressed(_) => None,
        }
    }

    /// The single payload to publish for this inbound message.
    pub fn to_payload(&self) -> Value {
        match self {
            DispatchOutcome::Completed(e) | DispatchOutcome::Failed(e) => e.to_payload(),
            DispatchOutcome::NotAddressed(status) => status.to_payload(),
        }
    }
}

/// Consumes inbound envelopes and invokes registered handlers.
pub struct InboundDispatcher {
    service_id: String,
    registry: Arc<FunctionRegistry>,
    validator: EnvelopeValidator,
    ids: Arc<IdGenerator>,
    errors: ErrorEnvelopeBuilder,
}

impl InboundDispatcher {
    pub fn new(
        service_id: impl Into<String>,
        registry: Arc<FunctionRegistry>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        let service_id = service_id.into();
        Self {
            errors: ErrorEnvelopeBuilder::new(service_id.clone(), ids.clone()),
            service_id,
            registry,
            validator: EnvelopeValidator::new(),
            ids,
        }
    }

    /// This process's service identity.
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Decode a raw bus payload and dispatch it.
    ///
    /// A null or malformed payload is answered with a `DECODE_ERROR` envelope
    /// addressed from whatever header fields can be recovered.
    pub async fn handle_payload(&self, payload: Option<&Value>) -> DispatchOutcome {
        match Envelope::from_payload(payload) {
            Ok(envelope) => self.handle(&envelope).await,
            Err(e) => {
                let header = Envelope::salvage_header(payload);
                warn!(
                    error = %e,
                    source_service = header.source_service.as_deref().unwrap_or_default(),
                    "Undecodable inbound payload"
                );
                DispatchOutcome::Failed(self.errors.build(&header, None, &DispatchError::from(e)))
            }
        }
    }

    /// Dispatch one inbound envelope. Never panics and never returns an error:
    /// every failure becomes the returned outcome.
    #[instrument(
        skip(self, envelope),
        fields(
            request_id = envelope.header.request_id.as_deref().unwrap_or_default(),
            source_service = envelope.header.source_service.as_deref().unwrap_or_default(),
        )
    )]
    pub async fn handle(&self, envelope: &Envelope) -> DispatchOutcome {
        let Envelope { header, value } = envelope;
        debug!(state = %DispatchState::Received, "Inbound envelope");

        // RECEIVED → VALIDATED
        if let Err(e) = self.validator.validate(header, value) {
            warn!(state = %DispatchState::Failed, error = %e, "Envelope rejected");
            let err = DispatchError::Validation(e);
            return DispatchOutcome::Failed(self.errors.build(header, Some(value), &err));
        }
        debug!(state = %DispatchState::Validated, "Envelope validated");

        // VALIDATED → ROUTED
        if let Some(destination) = header
            .destination_service
            .as_deref()
            .filter(|d| !d.is_empty())
        {
            if destination != self.service_id {
                debug!(
                    destination = destination,
                    service_id = %self.service_id,
                    "Envelope not intended for this service"
                );
                return DispatchOutcome::NotAddressed(StatusPayload::not_intended_for_this_service());
            }
        }
        debug!(state = %DispatchState::Routed, "Envelope routed");

        let content = value.message_content.as_ref();
        let Some(function_name) = content
            .and_then(|c| c.get(FUNCTION_NAME_KEY))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
        else {
            warn!("Inbound request names no function");
            return DispatchOutcome::Completed(self.respond(
                header,
                value,
                None,
                json!({ "errorMessage": "Function name not provided" }),
            ));
        };
        let input = content
            .and_then(|c| c.get(FUNCTION_INPUT_KEY))
            .cloned()
            .unwrap_or(Value::Null);

        let Some(handler) = self.registry.get(function_name) else {
            warn!(function = function_name, "Function not found");
            return DispatchOutcome::Completed(self.respond(
                header,
                value,
                Some(function_name),
                json!({ "errorMessage": format!("Function {function_name} not found") }),
            ));
        };

        let context = InboundContext {
            function_name: function_name.to_string(),
            header: header.clone(),
            value: value.clone(),
        };

        // ROUTED → COMPLETED | FAILED
        let result = AssertUnwindSafe(handler.call(input, context))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(output)) => {
                debug!(state = %DispatchState::Completed, function = function_name, "Handler completed");
                DispatchOutcome::Completed(self.respond(header, value, Some(function_name), output))
            }
            Ok(Err(e)) => {
                error!(
                    state = %DispatchState::Failed,
                    function = function_name,
                    error = %e,
                    "Handler failed"
                );
                let err = DispatchError::handler(function_name, &e);
                DispatchOutcome::Failed(self.errors.build(header, Some(value), &err))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    state = %DispatchState::Failed,
                    function = function_name,
                    panic = %message,
                    "Handler panicked"
                );
                let err = DispatchError::HandlerPanicked {
                    function: function_name.to_string(),
                    message,
                };
                DispatchOutcome::Failed(self.errors.build(header, Some(value), &err))
            }
        }
    }

    fn respond(
        &self,
        header: &MessageHeader,
        value: &MessageValue,
        function_name: Option<&str>,
        content: Value,
    ) -> Envelope {
        let response_id = self.ids.response_id(&self.service_id);
        let mut reply = reply_header(
            &self.service_id,
            &self.ids,
            header,
            response_id,
            SourceType::Service,
        );
        if let Some(name) = function_name {
            reply.source_function = Some(name.to_string());
        }
        Envelope::new(reply, reply_value(Some(value), MessageType::Response, content))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
