//! Shared result sink — the single mutual-exclusion domain of a batch run.
//!
//! Every fetch task pushes its outcome through [`ResultSink::record`]. The
//! aggregate file handle and the timing ledger live behind one
//! `tokio::sync::Mutex`, so the two-step update (append document, push timing
//! sample) is atomic with respect to other tasks. That pairing is load-bearing:
//! the finalizer matches the nth document in the file to the nth ledger entry.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::{FetchOutcome, TimingSample};

/// Opening delimiter written when the aggregate file is created
pub(crate) const AGGREGATE_HEADER: &[u8] = b"[\n";

/// Accumulates successful payloads into the aggregate file and timing samples
/// into the ledger, serializing all writers.
pub struct ResultSink {
    state: Mutex<SinkState>,
}

struct SinkState {
    file: File,
    ledger: Vec<TimingSample>,
}

impl ResultSink {
    /// Create the sink, truncating the aggregate file and writing the
    /// streaming-array header.
    ///
    /// The file stays in a well-defined but not-yet-valid intermediate state
    /// (open array, one compact document plus trailing comma per line) until
    /// the finalizer normalizes it after the barrier.
    pub async fn create(aggregate_path: &Path) -> Result<Self> {
        let mut file = File::create(aggregate_path).await?;
        file.write_all(AGGREGATE_HEADER).await?;
        file.flush().await?;

        Ok(Self {
            state: Mutex::new(SinkState {
                file,
                ledger: Vec::new(),
            }),
        })
    }

    /// Record one completed fetch.
    ///
    /// Failures are logged and dropped (no document, no timing sample).
    /// Successes append the payload and push the timing sample under a single
    /// lock acquisition; the network wait already happened, so the critical
    /// section is just serialization and a local file append.
    pub async fn record(&self, outcome: FetchOutcome) -> Result<()> {
        let (id, payload, duration) = match outcome {
            FetchOutcome::Failure { id, reason } => {
                tracing::warn!(request_id = id.0, reason = %reason, "Dropping failed fetch");
                return Ok(());
            }
            FetchOutcome::Success {
                id,
                payload,
                duration,
            } => (id, payload, duration),
        };

        // Compact serialization keeps each document on exactly one line,
        // which is what the finalizer's line-oriented parse relies on.
        let mut line = serde_json::to_vec(&payload)?;
        line.extend_from_slice(b",\n");

        let mut state = self.state.lock().await;
        state.file.write_all(&line).await?;
        state.file.flush().await?;
        state.ledger.push(TimingSample { id, duration });

        Ok(())
    }

    /// Close the aggregate file and hand the ledger to the caller.
    ///
    /// Called exactly once, after the fan-in barrier, when no writers remain.
    pub async fn into_ledger(self) -> Result<Vec<TimingSample>> {
        let mut state = self.state.into_inner();
        state.file.flush().await?;
        state.file.sync_all().await?;
        Ok(state.ledger)
    }
}
