//! Error types for batch-fetch
//!
//! Structural failures (invalid batch size, empty ledger, storage faults) are
//! surfaced through the [`Error`] enum; per-request fetch failures are not
//! errors at all — they are absorbed as [`crate::types::FetchOutcome::Failure`]
//! values and never unwind past the dispatcher's barrier.

use thiserror::Error;

/// Result type alias for batch-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batch-fetch
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.url_template")
        key: Option<String>,
    },

    /// Requested batch size was zero or negative
    #[error("invalid batch size: {requested} (must be greater than 0)")]
    InvalidBatchSize {
        /// The batch size the caller asked for
        requested: i64,
    },

    /// The timing ledger was empty at summarization time
    ///
    /// Raised when every fetch in the batch failed; min/max over an empty set
    /// is undefined. The aggregate file is still finalized (as an empty array)
    /// before this error is returned.
    #[error("no successful fetches: cannot compute timing statistics")]
    NoSuccessfulFetches,

    /// I/O error (aggregate or summary storage became unwritable)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (including a 200 response whose body is not JSON)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A fetch task panicked or was aborted before completing
    #[error("fetch task failed to complete: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Other error
    #[error("{0}")]
    Other(String),
}
