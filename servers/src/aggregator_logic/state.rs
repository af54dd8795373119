use lib_common::aggregator::{Fetch, HistoryBuffer, Poller, QueryService, SnapshotStore, SourceSpec};
use std::time::Duration;

/// Shared handles for the poller and the request handlers.
///
/// Request handlers only ever get the read-only `QueryService`; the writable
/// store and history go to the single poller built by `poller`.
#[derive(Clone)]
pub struct AppState {
    store: SnapshotStore,
    history: HistoryBuffer,
    query: QueryService,
}

impl AppState {
    pub fn new(history_capacity: usize) -> Self {
        let store = SnapshotStore::new();
        let history = HistoryBuffer::new(history_capacity);
        let query = QueryService::new(store.clone(), history.clone());
        Self { store, history, query }
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    pub fn poller<F: Fetch>(&self, fetcher: F, sources: Vec<SourceSpec>, interval: Duration) -> Poller<F> {
        Poller::new(fetcher, sources, self.store.clone(), self.history.clone(), interval)
    }
}
