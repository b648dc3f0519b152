//! Run summary derivation and persistence.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::types::{RunSummary, TimingEntry, TimingSample};

/// Derive fastest/slowest/total statistics from the timing ledger.
///
/// Ties on duration are broken by the lowest request id, so the result is
/// deterministic regardless of completion order. Returns
/// [`Error::NoSuccessfulFetches`] on an empty ledger; min/max over an empty
/// set is undefined.
pub(crate) fn summarize(ledger: &[TimingSample], total_elapsed: Duration) -> Result<RunSummary> {
    let first = ledger.first().ok_or(Error::NoSuccessfulFetches)?;

    let mut fastest = *first;
    let mut slowest = *first;
    for sample in &ledger[1..] {
        if sample.duration < fastest.duration
            || (sample.duration == fastest.duration && sample.id < fastest.id)
        {
            fastest = *sample;
        }
        if sample.duration > slowest.duration
            || (sample.duration == slowest.duration && sample.id < slowest.id)
        {
            slowest = *sample;
        }
    }

    let all_durations: BTreeMap<u32, f64> = ledger
        .iter()
        .map(|sample| (sample.id.0, sample.duration.as_secs_f64()))
        .collect();

    Ok(RunSummary {
        total_elapsed: total_elapsed.as_secs_f64(),
        fastest: TimingEntry::from(fastest),
        slowest: TimingEntry::from(slowest),
        all_durations,
        completed_at: Utc::now(),
    })
}

/// Write the summary to `path` as one structured pretty-printed JSON record.
pub(crate) async fn persist(summary: &RunSummary, path: &Path) -> Result<()> {
    let mut output = serde_json::to_vec_pretty(summary)?;
    output.push(b'\n');
    tokio::fs::write(path, output).await?;
    tracing::info!(path = %path.display(), "Run summary written");
    Ok(())
}
