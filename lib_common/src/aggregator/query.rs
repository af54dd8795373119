//! # Query Service
//!
//! Read-only view over the snapshot store and history buffer. Every call is a
//! lock-and-clone of `Arc`s: no network I/O, no dependency on a cycle in flight.

use std::sync::Arc;

use crate::aggregator::history::HistoryBuffer;
use crate::aggregator::snapshot::Snapshot;
use crate::aggregator::store::SnapshotStore;

/// Result of a query made before or after the first completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    /// No collection cycle has completed yet.
    Pending,
    /// At least one cycle has completed.
    Ready(T),
}

impl<T> Availability<T> {
    /// The value, or `None` while pending.
    pub fn ready(self) -> Option<T> {
        match self {
            Availability::Ready(value) => Some(value),
            Availability::Pending => None,
        }
    }
}

/// Cheap-to-clone handle shared by all request handlers.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: SnapshotStore,
    history: HistoryBuffer,
}

impl QueryService {
    /// Read handle over `store` and `history`.
    pub fn new(store: SnapshotStore, history: HistoryBuffer) -> Self {
        Self { store, history }
    }

    /// Current aggregate state.
    pub fn get_status(&self) -> Availability<Arc<Snapshot>> {
        match self.store.current() {
            Some(snapshot) => Availability::Ready(snapshot),
            None => Availability::Pending,
        }
    }

    /// Up to `capacity` most recent snapshots, oldest first.
    pub fn get_history(&self) -> Availability<Vec<Arc<Snapshot>>> {
        if !self.store.is_initialized() {
            return Availability::Pending;
        }
        Availability::Ready(self.history.all())
    }

    /// Maximum length of a `get_history` answer.
    pub fn history_capacity(&self) -> usize {
        self.history.capacity()
    }
}
