//! Pending Request Store - turns a published request into an awaitable reply.
//!
//! Maps correlation ids to callers waiting on a reply envelope. Removal from the
//! map is the only way to resolve an entry, so whichever of response arrival
//! or timeout removes it first wins and the other path finds nothing.

use dashmap::DashMap;
use shared_types::MessageValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How many timeouts past registration the sweep waits before removing an
/// entry. The caller's own timer starts after publish, so it must fire first.
pub const SWEEP_GRACE_FACTOR: u32 = 2;

/// A pending request waiting for a reply.
struct PendingRequest {
    /// Channel to deliver the reply value
    sender: oneshot::Sender<MessageValue>,
    /// When the request was registered
    created_at: Instant,
    /// Function that issued the request (for logging)
    source_function: String,
    /// Timeout for this request
    timeout: Duration,
}

/// Statistics for the pending request store.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests completed by a reply
    pub total_completed: AtomicU64,
    /// Total requests that timed out
    pub total_timeouts: AtomicU64,
    /// Total requests cancelled (caller gone or publish failed)
    pub total_cancelled: AtomicU64,
    /// Replies that matched no pending request
    pub total_unmatched: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub unmatched: u64,
}

impl PendingStats {
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            unmatched: self.total_unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Pending request store.
///
/// Flow:
/// 1. Correlator generates a correlation id
/// 2. Correlator calls `register()` to get a oneshot receiver
/// 3. Correlator publishes the request envelope
/// 4. Response listener receives a reply and calls `complete()`
/// 5. Correlator awaits the receiver or calls `expire()` on timeout
pub struct PendingRequestStore {
    /// Map of correlation id to pending request
    pending: DashMap<String, PendingRequest>,
    /// Default timeout
    default_timeout: Duration,
    /// Statistics
    stats: Arc<PendingStats>,
}

impl PendingRequestStore {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            default_timeout,
            stats: Arc::new(PendingStats::default()),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a pending request and get a receiver for its reply.
    pub fn register(
        &self,
        correlation_id: &str,
        source_function: &str,
        timeout: Option<Duration>,
    ) -> oneshot::Receiver<MessageValue> {
        let (tx, rx) = oneshot::channel();

        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            source_function: source_function.to_string(),
            timeout: timeout.unwrap_or(self.default_timeout),
        };

        if self.pending.insert(correlation_id.to_string(), request).is_some() {
            warn!(
                correlation_id = correlation_id,
                "Replaced pending request with duplicate correlation id"
            );
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = correlation_id,
            source_function = source_function,
            "Registered pending request"
        );

        rx
    }

    /// Complete a pending request with its reply.
    ///
    /// Returns true if the request was pending and its caller received the
    /// value. Returns false for unknown, expired or already completed ids.
    pub fn complete(&self, correlation_id: &str, value: MessageValue) -> bool {
        let Some((_, pending)) = self.pending.remove(correlation_id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = correlation_id,
                "Reply for unknown or expired correlation id"
            );
            return false;
        };

        let response_time = pending.created_at.elapsed();
        match pending.sender.send(value) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = correlation_id,
                    source_function = pending.source_function,
                    response_time_ms = response_time.as_millis(),
                    "Completed pending request"
                );
                true
            }
            Err(_) => {
                // Receiver dropped
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = correlation_id,
                    source_function = pending.source_function,
                    "Pending request receiver dropped"
                );
                false
            }
        }
    }

    /// Resolve a pending request as timed out.
    ///
    /// Returns false if a reply already claimed the entry.
    pub fn expire(&self, correlation_id: &str) -> bool {
        let Some((_, pending)) = self.pending.remove(correlation_id) else {
            return false;
        };
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = correlation_id,
            source_function = pending.source_function,
            timeout_ms = pending.timeout.as_millis(),
            "Pending request timed out"
        );
        true
    }

    /// Cancel a pending request.
    pub fn cancel(&self, correlation_id: &str) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove entries whose callers vanished without cleanup: anything older
    /// than [`SWEEP_GRACE_FACTOR`] times its timeout. Returns the number of
    /// entries removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, request| {
            let elapsed = now.duration_since(request.created_at);
            if elapsed > request.timeout.saturating_mul(SWEEP_GRACE_FACTOR) {
                warn!(
                    correlation_id = %id,
                    source_function = request.source_function,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = request.timeout.as_millis(),
                    "Removing expired pending request"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    pub fn is_pending(&self, correlation_id: &str) -> bool {
        self.pending.contains_key(correlation_id)
    }
}

/// Background sweep for entries whose callers vanished without cleanup.
pub async fn cleanup_task(store: Arc<PendingRequestStore>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending requests");
        }
    }
}
