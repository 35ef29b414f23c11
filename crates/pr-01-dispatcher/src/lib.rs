//! PR-01 Inbound Dispatcher - consumes request envelopes and answers each one.
//!
//! # Architecture
//!
//! ```text
//!   "<svc>" topic                                           "<svc>.reply" topic
//!        │                                                          ▲
//!        ▼                                                          │
//! ┌──────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐   │
//! │   Consumer   │──→│ Validator │──→│  Router  │──→│ Registry │───┘
//! │ (decode, one │   │ (schema,  │   │ (dest ==  │   │ (handler │
//! │  at a time)  │   │  fields)  │   │  self?)   │   │  call)   │
//! └──────────────┘   └───────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Guarantees
//!
//! | Guarantee | Enforcement |
//! |-----------|-------------|
//! | One reply per inbound message | [`InboundConsumer::process`] publishes every [`DispatchOutcome`] |
//! | Handler failures never escape | handler errors and panics become `ERROR_RESPONSE` envelopes |
//! | Foreign envelopes are not executed | destination mismatch short-circuits before lookup |
//! | Replies carry the current schema version | built by [`ErrorEnvelopeBuilder`] and the dispatcher |

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod error_envelope;
pub mod registry;

pub use consumer::InboundConsumer;
pub use dispatcher::{
    DispatchOutcome, DispatchState, InboundDispatcher, FUNCTION_INPUT_KEY, FUNCTION_NAME_KEY,
};
pub use error::DispatchError;
pub use error_envelope::ErrorEnvelopeBuilder;
pub use registry::{
    DynFunctionHandler, FunctionHandler, FunctionRegistry, InboundContext, RegistryBuilder,
    RegistryError,
};
