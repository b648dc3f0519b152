//! # batch-fetch
//!
//! Concurrent batch fetcher that aggregates remote JSON documents into a
//! single well-formed file and reports per-request timing statistics.
//!
//! ## Design Philosophy
//!
//! batch-fetch is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Deterministic output** - The aggregate is id-sorted and syntactically
//!   valid no matter in which order the fetches complete
//!
//! A run fans out one task per request id, records every success through a
//! single mutually-exclusive sink (document append plus timing sample, under
//! one lock), waits for all tasks at a fan-in barrier, normalizes the
//! aggregate into an id-sorted array, and writes a timing summary.
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_fetch::{BatchFetcher, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = BatchFetcher::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = fetcher.run(77).await?;
//!     println!(
//!         "fastest: id {} in {:.2}s",
//!         summary.fastest.id, summary.fastest.seconds
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP transport abstraction
pub mod client;
/// Configuration types
pub mod config;
/// Batch dispatch and the `BatchFetcher` facade
pub mod dispatcher;
/// Error types
pub mod error;
/// Single-request fetch execution
mod fetcher;
/// Aggregate normalization
mod finalizer;
/// Shared result sink (mutual-exclusion domain)
pub mod sink;
/// Run summary derivation and persistence
mod summary;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{HttpResourceClient, RemoteResponse, ResourceClient, TransportError};
pub use config::{Config, FetchConfig, OutputConfig};
pub use dispatcher::{BatchFetcher, MAX_BATCH_SIZE};
pub use error::{Error, Result};
pub use sink::ResultSink;
pub use types::{
    Event, FailureReason, FetchOutcome, RequestId, RunSummary, TimingEntry, TimingSample,
};
