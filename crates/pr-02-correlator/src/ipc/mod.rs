//! Bus-facing side of the correlator.

pub mod correlator;
pub mod listener;

pub use correlator::{RequestCorrelator, DEFAULT_REQUEST_TIMEOUT};
pub use listener::{handle_message, ResponseListener};
