//! Domain types for the correlator: the pending table and its errors.

pub mod error;
pub mod pending;

pub use error::CorrelationError;
pub use pending::{cleanup_task, PendingRequestStore, PendingStats, PendingStatsSnapshot};
