//! # Shared Types Crate
//!
//! The envelope contract shared by every service on the bus: header/value
//! types, schema versioning, validation, and identifier generation.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the wire shape of an envelope is defined
//!   once, here.
//! - **Lenient decode, strict validate**: every header/value field decodes as
//!   optional; [`EnvelopeValidator`] decides what is required.
//! - **Build-time versioning**: schema-version constants are compiled in and
//!   never read from configuration.

pub mod channel;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod schema;
pub mod validation;

pub use channel::ChannelPair;
pub use envelope::{
    DecodeError, Envelope, MessageHeader, MessageType, MessageValue, SourceType, StatusPayload,
};
pub use errors::ValidationError;
pub use ids::{CorrelationId, IdGenerator, SystemTimeSource, TimeSource};
pub use schema::{
    Compatibility, SchemaVersion, CURRENT_SCHEMA_VERSION, MAX_COMPATIBLE_SCHEMA_VERSION,
    MIN_COMPATIBLE_SCHEMA_VERSION,
};
pub use validation::{EnvelopeValidator, Validated, ValidationResult};
