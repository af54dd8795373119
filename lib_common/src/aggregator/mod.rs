//! # Aggregator Module
//!
//! Collects readings from several unreliable HTTP sources into one coherent,
//! timestamped view and a bounded rolling history.
//!
//! ## Data flow:
//! timer tick → `Poller` fans out to every `SourceSpec` through a `Fetch`
//! implementation → one `Snapshot` is assembled → it replaces the value in the
//! `SnapshotStore` and is appended to the `HistoryBuffer` → any number of
//! readers query both through the `QueryService`.
//!
//! The store and the buffer are the only shared mutable state. Only the poller
//! writes to them; readers only clone `Arc`s out of them.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Typed failure causes for sources and cycles.
pub mod error;
/// Bounded FIFO of past snapshots.
pub mod history;
/// The background collection loop and the `Fetch` seam.
pub mod poller;
/// Read-only query surface.
pub mod query;
/// Per-source outcome of one cycle.
pub mod reading;
/// Combined readings of one cycle.
pub mod snapshot;
/// Upstream definitions and payload schemas.
pub mod source;
/// Holder of the current snapshot.
pub mod store;

pub use error::{CycleError, SourceError, SourceSpecError};
pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use poller::{collect, Fetch, Poller, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use query::{Availability, QueryService};
pub use reading::{Fields, Reading};
pub use snapshot::Snapshot;
pub use source::{SourceKind, SourceSpec};
pub use store::SnapshotStore;
