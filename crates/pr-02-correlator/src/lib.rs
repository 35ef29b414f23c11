//! PR-02 Request Correlator - awaitable request/response over a fire-and-forget bus.
//!
//! # Architecture
//!
//! ```text
//!  handler ──send()──→ RequestCorrelator ──publish──→ "<dest>" topic
//!     ▲                      │ register(correlationId)
//!     │ oneshot              ▼
//!     └──────────── PendingRequestStore ←──complete()── ResponseListener ←── "<dest>.reply"
//!                            ▲
//!                            └──expire()── timeout
//! ```
//!
//! Replies are matched by the UUID `correlationId` the correlator stamped on
//! the request. `requestId` keeps its `RQ-` form for logs but is only unique
//! within one process, so it is never used for matching. Listeners skip
//! replies addressed to another service. Each pending entry resolves
//! exactly once: by the first matching reply or by its timeout, whichever
//! removes it from the store first.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ipc;

pub use domain::{
    cleanup_task, CorrelationError, PendingRequestStore, PendingStats, PendingStatsSnapshot,
};
pub use ipc::{handle_message, RequestCorrelator, ResponseListener, DEFAULT_REQUEST_TIMEOUT};
