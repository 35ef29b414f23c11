//! Request/response channel pairing.
//!
//! Each logical service owns a fixed pair of topics: requests addressed to the
//! service arrive on `<service>` and its replies leave on `<service>.reply`.

use serde::{Deserialize, Serialize};

/// Suffix appended to a request topic to form its response topic.
pub const REPLY_SUFFIX: &str = ".reply";

/// A pre-wired request topic and the response stream associated with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelPair {
    /// Logical destination service.
    pub service: String,
    /// Topic requests are published on.
    pub request_topic: String,
    /// Topic responses are read from.
    pub response_topic: String,
}

impl ChannelPair {
    /// The channel pair for a well-known destination service.
    pub fn for_service(service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            request_topic: service.clone(),
            response_topic: format!("{service}{REPLY_SUFFIX}"),
            service,
        }
    }
}
