//! # Process-Router Test Suite
//!
//! Cross-crate flows over the in-memory bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs        # Inbound dispatch over the bus, service to service
//!     └── correlation.rs  # Concurrent correlated sends, late replies
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pr-tests
//! cargo test -p pr-tests integration::correlation::
//! ```

#![allow(unused_variables)]
#![allow(dead_code)]

pub mod integration;
