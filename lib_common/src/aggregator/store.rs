//! # Snapshot Store
//!
//! Holds the most recently published snapshot. The lock only ever guards an
//! `Arc` swap or clone, so readers never wait on the poller's network I/O and
//! never observe a half-built snapshot.

use std::sync::{Arc, PoisonError, RwLock};

use crate::aggregator::snapshot::Snapshot;

/// Single-slot holder of the current snapshot.
///
/// Cloning the store yields another handle to the same slot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl SnapshotStore {
    /// Creates an uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current snapshot.
    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        // A poisoned slot still holds a whole Arc, so the value is safe to reuse.
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(snapshot);
    }

    /// The latest snapshot, or `None` before the first cycle completes.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `true` once a snapshot has been published.
    pub fn is_initialized(&self) -> bool {
        self.current().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::reading::Reading;
    use chrono::Utc;

    fn snapshot(cycle: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot::assemble(cycle, Utc::now(), vec![("fog".to_string(), Reading::failure("Offline"))]).unwrap())
    }

    #[test]
    fn test_starts_uninitialized() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_publish_replaces_and_shares_slot() {
        let store = SnapshotStore::new();
        let reader = store.clone();

        store.publish(snapshot(1));
        let first = reader.current().unwrap();
        store.publish(snapshot(2));

        assert_eq!(reader.current().unwrap().cycle(), 2);
        // A value handed out earlier is unaffected by later publishes.
        assert_eq!(first.cycle(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let store = SnapshotStore::new();
        store.publish(snapshot(0));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for cycle in 1..=500 {
                    store.publish(snapshot(cycle));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..500 {
                        let seen = store.current().unwrap();
                        assert!(seen.cycle() >= last);
                        assert_eq!(seen.readings().len(), 1);
                        last = seen.cycle();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.current().unwrap().cycle(), 500);
    }
}
