//! # Snapshot
//!
//! The combined readings of every source at one point in time. A snapshot is
//! built once per cycle and never mutated afterwards; it is shared behind an
//! `Arc` by the store, the history buffer and every reader.

use chrono::{DateTime, Local, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::aggregator::error::CycleError;
use crate::aggregator::reading::Reading;

/// Aggregate state of all sources for one collection cycle.
///
/// Serializes flat: one key per source name next to `timestamp` (Unix seconds,
/// fractional), `time_str` and `cycle`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    cycle: u64,
    #[serde(serialize_with = "unix_seconds")]
    timestamp: DateTime<Utc>,
    time_str: String,
    #[serde(flatten)]
    readings: BTreeMap<String, Reading>,
}

fn unix_seconds<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(ts.timestamp_micros() as f64 / 1_000_000.0)
}

impl Snapshot {
    /// Assembles the snapshot of cycle `cycle` from the per-source readings.
    ///
    /// Fails if two readings carry the same source name, since one would
    /// silently overwrite the other.
    pub fn assemble(
        cycle: u64,
        timestamp: DateTime<Utc>,
        readings: impl IntoIterator<Item = (String, Reading)>,
    ) -> Result<Self, CycleError> {
        let mut by_name = BTreeMap::new();
        for (name, reading) in readings {
            if by_name.contains_key(&name) {
                return Err(CycleError::DuplicateSource(name));
            }
            by_name.insert(name, reading);
        }

        Ok(Self {
            cycle,
            timestamp,
            time_str: timestamp.with_timezone(&Local).format("%a %b %e %H:%M:%S %Y").to_string(),
            readings: by_name,
        })
    }

    /// Sequence number of the cycle that produced this snapshot, starting at 1.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// When the cycle started.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// `timestamp` in local time, `Sat Oct 18 14:05:09 2026` style.
    pub fn time_str(&self) -> &str {
        &self.time_str
    }

    /// Readings keyed by source name.
    pub fn readings(&self) -> &BTreeMap<String, Reading> {
        &self.readings
    }

    /// Reading of one source, if it is configured.
    pub fn reading(&self, source: &str) -> Option<&Reading> {
        self.readings.get(source)
    }

    /// Number of sources that produced a usable reading.
    pub fn healthy_count(&self) -> usize {
        self.readings.values().filter(|r| r.is_success()).count()
    }

    /// Single-line status report, e.g. `fog: Foggy (0.87) | pm25: 12 µg/m³`.
    pub fn summary(&self) -> String {
        self.readings
            .iter()
            .map(|(name, reading)| format!("{}: {}", name, reading.summary()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
