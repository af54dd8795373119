//! # lib_common
//!
//! Shared building blocks for the station servers, gated by Cargo features:
//!
//! - **`aggregator`**: the polling core (readings, snapshots, store, history,
//!   poller, query service).
//! - **`retrieve`**: the HTTP client that feeds the poller.

#[cfg(feature = "aggregator")]
pub mod aggregator;

#[cfg(feature = "retrieve")]
pub mod retrieve;
