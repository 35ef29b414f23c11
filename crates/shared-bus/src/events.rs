//! # Bus Messages
//!
//! What flows through the shared bus: a topic name and a raw JSON payload.
//! Payloads stay untyped on the bus so that null values and malformed
//! envelopes reach consumers exactly as a broker would deliver them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Envelope;

/// A single message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Topic (logical channel) the message was published on.
    pub topic: String,
    /// Raw payload; `None` models a null broker value.
    pub payload: Option<Value>,
}

impl BusMessage {
    /// Wrap an envelope for publishing.
    pub fn envelope(topic: impl Into<String>, envelope: &Envelope) -> Self {
        Self {
            topic: topic.into(),
            payload: Some(envelope.to_payload()),
        }
    }

    /// Publish an arbitrary payload.
    pub fn raw(topic: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Returns true if the payload is absent or JSON null.
    pub fn is_null(&self) -> bool {
        matches!(self.payload, None | Some(Value::Null))
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// Create a filter that accepts every topic.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for a single topic.
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| *t == message.topic)
    }
}
