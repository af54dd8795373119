//! # Aggregator Error Types
//!
//! Typed failure causes for the collection pipeline. A `SourceError` never leaves
//! the poller as an `Err`: it is rendered into a `Reading::Failure` so the cause is
//! published alongside the healthy sources. `CycleError` marks a whole cycle as
//! unusable; the poller logs it and keeps the previous snapshot current.

use std::time::Duration;
use thiserror::Error;

/// Why a single source produced no usable reading in a cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    /// The source did not answer within its per-call budget.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// No TCP connection could be established (refused, unreachable, DNS).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The source answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Numeric HTTP status returned by the source.
        status: u16,
        /// The `error` field of the body when present, otherwise the canonical reason.
        message: String,
    },

    /// The body was not valid JSON.
    #[error("malformed response body: {0}")]
    Decode(String),

    /// The body was JSON but did not match the schema of the source.
    #[error("unexpected payload: {0}")]
    Schema(String),

    /// The vision worker answered but has not scored a frame yet.
    #[error("vision worker is still initializing")]
    Initializing,

    /// Any other transport-level failure reported by the HTTP client.
    #[error("request failed: {0}")]
    Request(String),
}

/// Why a whole collection cycle was discarded.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Two configured sources share a name, so their readings would collide.
    #[error("source '{0}' is configured more than once")]
    DuplicateSource(String),

    /// The cycle task panicked before the snapshot could be assembled.
    #[error("collection cycle panicked: {0}")]
    Panicked(String),

    /// The cycle task was cancelled by the runtime.
    #[error("collection cycle was aborted")]
    Aborted,
}

/// Invalid source definition, caught when the source list is built.
#[derive(Debug, Error, PartialEq)]
pub enum SourceSpecError {
    /// The source name is blank.
    #[error("source name must not be empty")]
    EmptyName,

    /// The source name equals one of the snapshot's own keys.
    #[error("source name '{0}' collides with a snapshot field")]
    ReservedName(String),

    /// The base URL does not parse or cannot carry a path.
    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl {
        /// The base URL as configured.
        url: String,
        /// Parser message.
        reason: String,
    },
}
