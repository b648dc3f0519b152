//! Core types for batch-fetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Unique identifier for one fetch request within a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u32);

impl RequestId {
    /// Create a new RequestId
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner u32 value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for RequestId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<RequestId> for u32 {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a single fetch failed
///
/// Both variants are handled identically: the request is logged and excluded
/// from the aggregate document and the timing ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The server answered with a non-200 status code
    Status(u16),
    /// The request never produced a response (connection refused, DNS, reset)
    Transport(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Status(code) => write!(f, "HTTP status {}", code),
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Result of one fetch task, produced exactly once per request
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// The fetch succeeded and yielded a JSON document
    Success {
        /// Request id this payload belongs to
        id: RequestId,
        /// The fetched document, passed through opaquely
        payload: serde_json::Value,
        /// Wall-clock time from dispatch to response arrival
        duration: Duration,
    },
    /// The fetch failed; excluded from the aggregate and the ledger
    Failure {
        /// Request id that failed
        id: RequestId,
        /// Classification of the failure
        reason: FailureReason,
    },
}

impl FetchOutcome {
    /// Request id this outcome belongs to
    pub fn id(&self) -> RequestId {
        match self {
            FetchOutcome::Success { id, .. } | FetchOutcome::Failure { id, .. } => *id,
        }
    }

    /// Whether this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// One completed-fetch timing measurement
///
/// The ledger is a `Vec<TimingSample>` whose order is completion order; the
/// order carries no correctness meaning, but the sink guarantees that the nth
/// sample corresponds to the nth document appended to the aggregate file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingSample {
    /// Request id the measurement belongs to
    pub id: RequestId,
    /// Measured fetch duration
    pub duration: Duration,
}

/// A `(id, seconds)` pair as persisted in the run summary
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    /// Request id
    pub id: RequestId,
    /// Fetch duration in seconds
    pub seconds: f64,
}

impl From<TimingSample> for TimingEntry {
    fn from(sample: TimingSample) -> Self {
        Self {
            id: sample.id,
            seconds: sample.duration.as_secs_f64(),
        }
    }
}

/// Timing statistics for one completed batch run
///
/// Derived once from the timing ledger after the fan-in barrier and written
/// to the summary file as a single structured record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock seconds for the whole batch
    pub total_elapsed: f64,
    /// The successful fetch with the minimum duration (ties: lowest id)
    pub fastest: TimingEntry,
    /// The successful fetch with the maximum duration (ties: lowest id)
    pub slowest: TimingEntry,
    /// Duration in seconds for every successful fetch, keyed by request id
    pub all_durations: BTreeMap<u32, f64>,
    /// When the batch finished
    pub completed_at: DateTime<Utc>,
}

/// Events emitted during a batch run
///
/// Consumers subscribe via [`crate::BatchFetcher::subscribe`]; the run does
/// not depend on anyone listening.
#[derive(Clone, Debug)]
pub enum Event {
    /// A fetch task dispatched its request
    FetchStarted {
        /// Request id
        id: RequestId,
    },

    /// A fetch task received a 200 response
    FetchCompleted {
        /// Request id
        id: RequestId,
        /// Measured fetch duration
        duration: Duration,
    },

    /// A fetch task failed (non-200 or transport error)
    FetchFailed {
        /// Request id
        id: RequestId,
        /// Human-readable failure description
        reason: String,
    },

    /// The requested batch size exceeded the upstream ceiling and was reduced
    BatchSizeClamped {
        /// The batch size the caller asked for
        requested: i64,
        /// The batch size actually used
        clamped: u32,
    },

    /// The whole batch finished and both output files are closed
    BatchComplete {
        /// Number of successful fetches
        succeeded: usize,
        /// Number of failed fetches
        failed: usize,
        /// Wall-clock duration of the run
        total_elapsed: Duration,
    },
}
