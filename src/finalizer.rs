//! Aggregate normalization — turn the append-friendly intermediate file into
//! a canonical, id-sorted JSON array.
//!
//! Runs exactly once per batch, after the fan-in barrier, when no writers
//! remain. Sort keys come from the timing ledger: the sink appends document
//! and ledger entry under one lock, so the nth line of the intermediate file
//! belongs to the nth ledger entry.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::types::{RequestId, TimingSample};

/// Rewrite the intermediate aggregate at `path` as a pretty-printed JSON
/// array of payloads sorted ascending by request id.
///
/// An aggregate with zero successes becomes a valid empty array.
pub(crate) async fn finalize(path: &Path, ledger: &[TimingSample]) -> Result<()> {
    let raw = tokio::fs::read_to_string(path).await?;
    let documents = parse_intermediate(&raw)?;

    if documents.len() != ledger.len() {
        tracing::warn!(
            documents = documents.len(),
            ledger_entries = ledger.len(),
            "Aggregate document count does not match ledger; normalizing the common prefix"
        );
    }

    let records: Vec<(RequestId, Value)> = ledger
        .iter()
        .map(|sample| sample.id)
        .zip(documents)
        .collect();
    let sorted = sort_by_request_id(records);

    let payloads: Vec<Value> = sorted.into_iter().map(|(_, doc)| doc).collect();
    let mut output = serde_json::to_vec_pretty(&payloads)?;
    output.push(b'\n');
    tokio::fs::write(path, output).await?;

    tracing::info!(documents = payloads.len(), path = %path.display(), "Aggregate finalized");
    Ok(())
}

/// Sort aggregate records ascending by request id.
///
/// Stable and repeatable: applying it to an already-sorted sequence returns
/// an identical sequence.
pub(crate) fn sort_by_request_id(mut records: Vec<(RequestId, Value)>) -> Vec<(RequestId, Value)> {
    records.sort_by_key(|(id, _)| *id);
    records
}

/// Parse the intermediate format: an `[` header followed by one compact
/// document plus trailing comma per line.
///
/// A torn trailing fragment (partial final write before a storage fault) is
/// dropped with a warning; a malformed line anywhere else is corruption and
/// propagates.
fn parse_intermediate(raw: &str) -> Result<Vec<Value>> {
    let body = raw.strip_prefix('[').unwrap_or(raw);
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut documents = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str(line.trim_end_matches(',')) {
            Ok(document) => documents.push(document),
            Err(e) if index + 1 == lines.len() => {
                tracing::warn!(error = %e, "Dropping torn trailing fragment from aggregate");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(documents)
}
