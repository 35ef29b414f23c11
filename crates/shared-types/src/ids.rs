//! # Identifier Generation
//!
//! Request, response and error identifiers embed a millisecond timestamp:
//!
//! - `RQ-<sourceFunction>-<ts>` for outbound requests
//! - `RES-<serviceId>-<ts>` for dispatcher responses
//! - `ERR-<serviceId>-<ts>` for error envelopes
//! - `Not-Sent-<ts>` when an inbound request carried no `requestId`
//!
//! Timestamps are strictly monotonic per generator, so ids from one process
//! never repeat. They can repeat across processes, so replies are matched on
//! a [`CorrelationId`] instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Key a reply is matched on, unique across every service on the bus.
///
/// UUID v7, so ids sort by creation time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time source trait for testability.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// System clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            // Clock before the Unix epoch; the monotonic counter still advances.
            .unwrap_or(0)
    }
}

/// Generates envelope identifiers with strictly increasing timestamps.
pub struct IdGenerator {
    clock: Arc<dyn TimeSource>,
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            clock,
            last: AtomicU64::new(0),
        }
    }

    /// Generator backed by the system clock.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemTimeSource))
    }

    /// Next timestamp: wall-clock millis, bumped past the previous value.
    pub fn next_timestamp(&self) -> u64 {
        let now = self.clock.now_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn request_id(&self, source_function: &str) -> String {
        format!("RQ-{}-{}", source_function, self.next_timestamp())
    }

    pub fn response_id(&self, service_id: &str) -> String {
        format!("RES-{}-{}", service_id, self.next_timestamp())
    }

    pub fn error_id(&self, service_id: &str) -> String {
        format!("ERR-{}-{}", service_id, self.next_timestamp())
    }

    /// Placeholder request id for replies to requests that carried none.
    pub fn not_sent_id(&self) -> String {
        format!("Not-Sent-{}", self.next_timestamp())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish()
    }
}
