//! # Poller
//!
//! The long-lived collection loop. Each tick runs one cycle:
//!
//! 1.  **Fan out**: every configured source is fetched concurrently. Each fetch is
//!     bounded by the source's own timeout, so a hung source degrades to a
//!     failure reading instead of holding the cycle hostage.
//! 2.  **Join**: the cycle waits for every source to resolve, success or not.
//! 3.  **Publish**: one snapshot is assembled, swapped into the store and appended
//!     to the history.
//!
//! The history append happens before the store publish, so once the store is
//! initialized the history already holds the current snapshot.
//!
//! Cycles never overlap: the loop awaits the running cycle before waiting for the
//! next tick, and ticks missed while a cycle overran are delayed rather than
//! replayed in a burst. A failed cycle (duplicate source names, a panic inside
//! the fetch task) is logged and skipped; the previous snapshot stays current.
//! The loop only ends when the shutdown channel fires or closes.

use chrono::Utc;
use futures_util::future::join_all;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::aggregator::error::{CycleError, SourceError};
use crate::aggregator::history::HistoryBuffer;
use crate::aggregator::reading::Reading;
use crate::aggregator::snapshot::Snapshot;
use crate::aggregator::source::SourceSpec;
use crate::aggregator::store::SnapshotStore;

/// Default pause between two cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest accepted pause between two cycles.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Performs one fetch against one source. Implementations must not retry and
/// must turn every failure into a `Reading::Failure`.
pub trait Fetch: Send + Sync + 'static {
    /// Fetches `source` once. The poller bounds the returned future with the
    /// source's timeout.
    fn fetch(&self, source: &SourceSpec) -> impl Future<Output = Reading> + Send;
}

impl<T: Fetch> Fetch for Arc<T> {
    fn fetch(&self, source: &SourceSpec) -> impl Future<Output = Reading> + Send {
        (**self).fetch(source)
    }
}

/// Fetches every source concurrently and waits for all of them.
///
/// Readings come back in the order of `sources`, whatever order the fetches
/// completed in.
pub async fn collect<F: Fetch>(fetcher: &F, sources: &[SourceSpec]) -> Vec<(String, Reading)> {
    let pending: Vec<_> = sources.iter().map(|source| fetch_one(fetcher, source)).collect();
    join_all(pending).await
}

async fn fetch_one<F: Fetch>(fetcher: &F, source: &SourceSpec) -> (String, Reading) {
    let reading = match timeout(source.timeout(), fetcher.fetch(source)).await {
        Ok(reading) => reading,
        Err(_) => Reading::from(Err(SourceError::Timeout(source.timeout()))),
    };
    match reading.error() {
        Some(cause) => warn!(source = source.name(), url = %source.endpoint(), error = cause, "Source unavailable"),
        None => debug!(source = source.name(), "Source reading accepted"),
    }
    (source.name().to_string(), reading)
}

/// Background collector feeding the snapshot store and the history buffer.
pub struct Poller<F> {
    fetcher: Arc<F>,
    sources: Arc<[SourceSpec]>,
    store: SnapshotStore,
    history: HistoryBuffer,
    interval: Duration,
    cycle: u64,
}

impl<F: Fetch> Poller<F> {
    /// Creates a poller writing into `store` and `history`.
    ///
    /// An `interval` below [`MIN_POLL_INTERVAL`] is raised to it.
    pub fn new(
        fetcher: F,
        sources: Vec<SourceSpec>,
        store: SnapshotStore,
        history: HistoryBuffer,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sources: sources.into(),
            store,
            history,
            interval: interval.max(MIN_POLL_INTERVAL),
            cycle: 0,
        }
    }

    /// Number of cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.cycle
    }

    /// Runs cycles on the configured interval until `shutdown` fires or closes.
    ///
    /// The first cycle starts immediately.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            sources = self.sources.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Poller started."
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Poller received shutdown signal.");
                    break;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(cycle = self.cycle, "Poller received shutdown signal mid-cycle; cycle abandoned.");
                    break;
                }
                result = self.run_cycle() => match result {
                    Ok(snapshot) => info!(
                        cycle = snapshot.cycle(),
                        time = snapshot.time_str(),
                        healthy = snapshot.healthy_count(),
                        total = snapshot.readings().len(),
                        "{}",
                        snapshot.summary()
                    ),
                    Err(e) => error!(cycle = self.cycle, error = %e, "Collection cycle skipped; keeping previous snapshot."),
                },
            }
        }

        info!(cycles = self.cycles_started(), "Poller stopped.");
    }

    /// Runs exactly one cycle and publishes its snapshot.
    ///
    /// On error nothing is published and the store keeps its previous value.
    pub async fn run_cycle(&mut self) -> Result<Arc<Snapshot>, CycleError> {
        self.cycle += 1;
        let cycle = self.cycle;
        let timestamp = Utc::now();

        let fetcher = Arc::clone(&self.fetcher);
        let sources = Arc::clone(&self.sources);
        // Dropping this future (shutdown mid-cycle) aborts the fetch task with it.
        let mut task = AbortOnDrop(tokio::spawn(async move { collect(&*fetcher, &sources).await }));
        let readings = (&mut task.0).await.map_err(|e| {
            if e.is_panic() {
                CycleError::Panicked(panic_message(e.into_panic()))
            } else {
                CycleError::Aborted
            }
        })?;

        let snapshot = Arc::new(Snapshot::assemble(cycle, timestamp, readings)?);
        self.history.append(Arc::clone(&snapshot));
        self.store.publish(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
