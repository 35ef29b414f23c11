//! # Shared Bus - Event Bus for Inter-Service Communication
//!
//! An in-memory, topic-addressed broadcast bus standing in for the broker.
//! Services publish [`BusMessage`]s on a topic and subscribe with a
//! [`TopicFilter`].
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Service A   │                    │  Service B   │
//! │  correlator  │    publish()       │  dispatcher  │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!        ↑               ▼                    ↑ │
//!        │         ┌──────────────┐          │ │
//!        └──────── │  Event Bus   │ ─────────┘ │
//!     "<svc>.reply"│              │ ←──────────┘
//!                  └──────────────┘   "<svc>.reply"
//! ```
//!
//! Payloads are raw JSON so that null values and malformed envelopes reach
//! consumers unchanged; decoding is the consumer's job.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BusMessage, TopicFilter};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
