//! Single-request fetch execution — issue one GET, time it, classify the outcome.

use std::time::Instant;

use tokio::sync::broadcast;
use url::Url;

use crate::client::ResourceClient;
use crate::error::Result;
use crate::types::{Event, FailureReason, FetchOutcome, RequestId};

/// Fetch one resource and classify the result.
///
/// The duration covers dispatch to response arrival, including body transfer
/// but not JSON parsing. Per-request failures (non-200 status, transport
/// errors) are returned as [`FetchOutcome::Failure`] and never as `Err`; the
/// only `Err` here is a 200 response whose body is not valid JSON, which is
/// fatal to the batch.
pub(crate) async fn fetch(
    client: &dyn ResourceClient,
    url: &Url,
    id: RequestId,
    event_tx: &broadcast::Sender<Event>,
) -> Result<FetchOutcome> {
    tracing::info!(request_id = id.0, url = %url, "Sending request");
    event_tx.send(Event::FetchStarted { id }).ok();

    let start = Instant::now();
    let response = client.get(url).await;
    let duration = start.elapsed();

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            let reason = FailureReason::Transport(e.0);
            tracing::warn!(request_id = id.0, reason = %reason, "Error fetching resource");
            event_tx
                .send(Event::FetchFailed {
                    id,
                    reason: reason.to_string(),
                })
                .ok();
            return Ok(FetchOutcome::Failure { id, reason });
        }
    };

    if response.status != 200 {
        let reason = FailureReason::Status(response.status);
        tracing::warn!(request_id = id.0, reason = %reason, "Error fetching resource");
        event_tx
            .send(Event::FetchFailed {
                id,
                reason: reason.to_string(),
            })
            .ok();
        return Ok(FetchOutcome::Failure { id, reason });
    }

    // A 200 with a non-JSON body is not modeled as a per-request failure;
    // it propagates and fails the batch after the barrier.
    let payload: serde_json::Value = serde_json::from_slice(&response.body)?;

    tracing::info!(
        request_id = id.0,
        duration_ms = duration.as_millis() as u64,
        "Got data"
    );
    event_tx.send(Event::FetchCompleted { id, duration }).ok();

    Ok(FetchOutcome::Success {
        id,
        payload,
        duration,
    })
}
