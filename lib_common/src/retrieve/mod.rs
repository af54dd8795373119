//! # Data Retrieval Module
//!
//! HTTP clients used to reach the upstream sources of the aggregator.
//!
//! ## Contained Modules:
//!
//! - **`http_source`**: `HttpSourceClient`, the `reqwest`-backed implementation
//!   of the poller's `Fetch` seam. One bounded GET per source per cycle; every
//!   failure mode comes back as a typed `Reading::Failure`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Bounded-timeout HTTP fetcher for aggregator sources.
pub mod http_source;

pub use http_source::HttpSourceClient;
