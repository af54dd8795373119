//! # History Buffer
//!
//! Bounded FIFO of past snapshots, oldest first. Appending at capacity evicts the
//! oldest entry under the same lock, so a reader never sees the buffer mid-eviction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::aggregator::snapshot::Snapshot;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Fixed-capacity, chronologically ordered snapshot history.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<Arc<Snapshot>>>>,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// Creates an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Maximum number of snapshots kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends at the tail, evicting from the head when full.
    pub fn append(&self, snapshot: Arc<Snapshot>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(snapshot);
    }

    /// Independent copy of the buffer, oldest first.
    pub fn all(&self) -> Vec<Arc<Snapshot>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of snapshots currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
