//! Batch dispatch — fan out one fetch task per request id, fan in, then
//! finalize the aggregate and write the run summary.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, broadcast};

use crate::client::{HttpResourceClient, ResourceClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher;
use crate::finalizer;
use crate::sink::ResultSink;
use crate::summary;
use crate::types::{Event, RequestId, RunSummary};

/// Fixed upstream-imposed ceiling on the batch size
pub const MAX_BATCH_SIZE: u32 = 100;

/// Buffer size for the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Main batch fetcher instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BatchFetcher {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// HTTP transport (trait object for pluggable implementations)
    client: Arc<dyn ResourceClient>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
}

impl BatchFetcher {
    /// Create a fetcher with the production HTTP transport.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_client(config, Arc::new(HttpResourceClient::new()))
    }

    /// Create a fetcher with a custom transport (tests inject mocks here).
    pub fn with_client(config: Config, client: Arc<dyn ResourceClient>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            client,
            event_tx,
        })
    }

    /// Subscribe to run events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run one batch: fetch ids `1..=batch_size` concurrently, aggregate the
    /// successful payloads, and write the timing summary.
    ///
    /// Blocks until every fetch task has completed (full fan-in, no
    /// short-circuit). When it returns `Ok`, both output files are fully
    /// written and closed: the aggregate as an id-sorted JSON array, the
    /// summary as one structured record.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBatchSize`] for `batch_size <= 0`, before any
    ///   network or filesystem activity.
    /// - [`Error::NoSuccessfulFetches`] when every fetch failed; the
    ///   aggregate file has already been finalized to a valid empty array.
    /// - [`Error::Io`] / [`Error::Serialization`] for storage faults and
    ///   non-JSON 200 bodies, surfaced after the barrier.
    ///
    /// A batch size above [`MAX_BATCH_SIZE`] is clamped with a warning, never
    /// rejected. Individual fetch failures are logged and excluded from both
    /// outputs without affecting the rest of the batch.
    pub async fn run(&self, batch_size: i64) -> Result<RunSummary> {
        if batch_size <= 0 {
            return Err(Error::InvalidBatchSize {
                requested: batch_size,
            });
        }

        let count = if batch_size > i64::from(MAX_BATCH_SIZE) {
            tracing::warn!(
                requested = batch_size,
                clamped = MAX_BATCH_SIZE,
                "Batch size exceeds ceiling, clamping"
            );
            self.event_tx
                .send(Event::BatchSizeClamped {
                    requested: batch_size,
                    clamped: MAX_BATCH_SIZE,
                })
                .ok();
            MAX_BATCH_SIZE
        } else {
            batch_size as u32
        };

        let sink = Arc::new(ResultSink::create(&self.config.output.aggregate_path).await?);
        let concurrency = Arc::new(Semaphore::new(self.config.fetch.max_concurrent_fetches));
        let start = Instant::now();

        let handles: Vec<tokio::task::JoinHandle<Result<()>>> = (1..=count)
            .map(|id| {
                let config = Arc::clone(&self.config);
                let client = Arc::clone(&self.client);
                let sink = Arc::clone(&sink);
                let event_tx = self.event_tx.clone();
                let concurrency = Arc::clone(&concurrency);

                tokio::spawn(async move {
                    let _permit = concurrency
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::Other(e.to_string()))?;
                    let url = config.endpoint_for(id)?;
                    let outcome =
                        fetcher::fetch(client.as_ref(), &url, RequestId(id), &event_tx).await?;
                    sink.record(outcome).await
                })
            })
            .collect();

        // Fan-in barrier: every task runs to completion before anything below
        let mut first_error: Option<Error> = None;
        for joined in futures::future::join_all(handles).await {
            let result = joined.unwrap_or_else(|e| Err(Error::TaskJoin(e)));
            if let Err(e) = result
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let total_elapsed = start.elapsed();

        let sink = Arc::into_inner(sink)
            .ok_or_else(|| Error::Other("result sink still shared after barrier".to_string()))?;
        let ledger = sink.into_ledger().await?;

        finalizer::finalize(&self.config.output.aggregate_path, &ledger).await?;

        let succeeded = ledger.len();
        let failed = count as usize - succeeded;
        tracing::info!(
            requested = count,
            succeeded,
            failed,
            elapsed_s = %format!("{:.2}", total_elapsed.as_secs_f64()),
            "Batch fetch complete"
        );

        let run_summary = summary::summarize(&ledger, total_elapsed)?;
        summary::persist(&run_summary, &self.config.output.summary_path).await?;

        tracing::info!(
            request_id = run_summary.fastest.id.0,
            seconds = %format!("{:.2}", run_summary.fastest.seconds),
            "Fastest response"
        );
        tracing::info!(
            request_id = run_summary.slowest.id.0,
            seconds = %format!("{:.2}", run_summary.slowest.seconds),
            "Slowest response"
        );

        self.event_tx
            .send(Event::BatchComplete {
                succeeded,
                failed,
                total_elapsed,
            })
            .ok();

        Ok(run_summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::{RemoteResponse, TransportError};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    /// Mock transport: answers from the trailing path segment of the URL,
    /// failing the ids in `fail_ids` with a 500 and delaying each response
    /// by a small random amount to shuffle completion order.
    struct ScriptedClient {
        fail_ids: Vec<u32>,
        max_jitter_ms: u64,
    }

    impl ScriptedClient {
        fn all_ok() -> Self {
            Self {
                fail_ids: Vec::new(),
                max_jitter_ms: 5,
            }
        }
    }

    #[async_trait]
    impl ResourceClient for ScriptedClient {
        async fn get(&self, url: &Url) -> std::result::Result<RemoteResponse, TransportError> {
            let id: u32 = url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| TransportError("no id in url".to_string()))?;

            if self.max_jitter_ms > 0 {
                let jitter = rand::random::<u64>() % self.max_jitter_ms;
                tokio::time::sleep(Duration::from_millis(jitter)).await;
            }

            if self.fail_ids.contains(&id) {
                return Ok(RemoteResponse {
                    status: 500,
                    body: Vec::new(),
                });
            }
            Ok(RemoteResponse {
                status: 200,
                body: format!(r#"{{"id":{},"title":"post {}"}}"#, id, id).into_bytes(),
            })
        }
    }

    fn test_fetcher(temp_dir: &TempDir, client: Arc<dyn ResourceClient>) -> BatchFetcher {
        let config = Config {
            fetch: crate::config::FetchConfig {
                url_template: "http://localhost/posts/{id}".to_string(),
                ..Default::default()
            },
            output: crate::config::OutputConfig {
                aggregate_path: temp_dir.path().join("data.json"),
                summary_path: temp_dir.path().join("response_times.json"),
            },
        };
        BatchFetcher::with_client(config, client).unwrap()
    }

    fn aggregate_ids(temp_dir: &TempDir) -> Vec<u64> {
        let content = std::fs::read_to_string(temp_dir.path().join("data.json")).unwrap();
        let docs: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        docs.iter().map(|d| d["id"].as_u64().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected_before_any_io() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = test_fetcher(&temp_dir, Arc::new(ScriptedClient::all_ok()));

        let err = fetcher.run(0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidBatchSize { requested: 0 }));

        let err = fetcher.run(-7).await.unwrap_err();
        assert!(matches!(err, Error::InvalidBatchSize { requested: -7 }));

        // No output files were created or modified
        assert!(!temp_dir.path().join("data.json").exists());
        assert!(!temp_dir.path().join("response_times.json").exists());
    }

    #[tokio::test]
    async fn test_all_success_batch_is_sorted_and_complete() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = test_fetcher(&temp_dir, Arc::new(ScriptedClient::all_ok()));

        let summary = fetcher.run(20).await.unwrap();

        assert_eq!(aggregate_ids(&temp_dir), (1..=20).collect::<Vec<u64>>());
        assert_eq!(summary.all_durations.len(), 20);
        assert!(summary.total_elapsed >= summary.slowest.seconds);
        assert!(summary.fastest.seconds <= summary.slowest.seconds);
    }

    #[tokio::test]
    async fn test_failed_ids_are_silently_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let client = ScriptedClient {
            fail_ids: vec![2, 4, 6, 8, 10],
            max_jitter_ms: 5,
        };
        let fetcher = test_fetcher(&temp_dir, Arc::new(client));

        let summary = fetcher.run(10).await.unwrap();

        assert_eq!(aggregate_ids(&temp_dir), vec![1, 3, 5, 7, 9]);
        assert_eq!(summary.all_durations.len(), 5);
        assert!(!summary.all_durations.contains_key(&2));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_clamped_with_warning_event() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = test_fetcher(&temp_dir, Arc::new(ScriptedClient::all_ok()));
        let mut events = fetcher.subscribe();

        let summary = fetcher.run(150).await.unwrap();

        assert_eq!(summary.all_durations.len(), 100);
        assert_eq!(aggregate_ids(&temp_dir).len(), 100);
        assert!(matches!(
            events.try_recv().unwrap(),
            Event::BatchSizeClamped {
                requested: 150,
                clamped: 100,
            }
        ));
    }

    #[tokio::test]
    async fn test_all_failures_leave_valid_empty_aggregate() {
        let temp_dir = TempDir::new().unwrap();
        let client = ScriptedClient {
            fail_ids: (1..=10).collect(),
            max_jitter_ms: 0,
        };
        let fetcher = test_fetcher(&temp_dir, Arc::new(client));

        let err = fetcher.run(10).await.unwrap_err();
        assert!(matches!(err, Error::NoSuccessfulFetches));

        // Aggregate was still finalized to a valid empty array
        assert_eq!(aggregate_ids(&temp_dir), Vec::<u64>::new());
        // The summary file was never written
        assert!(!temp_dir.path().join("response_times.json").exists());
    }

    #[tokio::test]
    async fn test_unwritable_aggregate_storage_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            fetch: crate::config::FetchConfig {
                url_template: "http://localhost/posts/{id}".to_string(),
                ..Default::default()
            },
            output: crate::config::OutputConfig {
                // Parent directory does not exist, so creating the file fails
                aggregate_path: temp_dir.path().join("missing").join("data.json"),
                summary_path: temp_dir.path().join("response_times.json"),
            },
        };
        let fetcher =
            BatchFetcher::with_client(config, Arc::new(ScriptedClient::all_ok())).unwrap();

        let err = fetcher.run(3).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        // The run aborted before any fetch completed; no summary either
        assert!(!temp_dir.path().join("response_times.json").exists());
    }

    #[tokio::test]
    async fn test_unwritable_summary_storage_fails_after_finalize() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            fetch: crate::config::FetchConfig {
                url_template: "http://localhost/posts/{id}".to_string(),
                ..Default::default()
            },
            output: crate::config::OutputConfig {
                aggregate_path: temp_dir.path().join("data.json"),
                summary_path: temp_dir.path().join("missing").join("response_times.json"),
            },
        };
        let fetcher =
            BatchFetcher::with_client(config, Arc::new(ScriptedClient::all_ok())).unwrap();

        let err = fetcher.run(5).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        // Finalization ran before the summary write, so the aggregate is
        // already a valid sorted array
        assert_eq!(aggregate_ids(&temp_dir), (1..=5).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_batch_complete_event_carries_counts() {
        let temp_dir = TempDir::new().unwrap();
        let client = ScriptedClient {
            fail_ids: vec![3],
            max_jitter_ms: 0,
        };
        let fetcher = test_fetcher(&temp_dir, Arc::new(client));
        let mut events = fetcher.subscribe();

        fetcher.run(5).await.unwrap();

        let mut saw_complete = false;
        while let Ok(event) = events.try_recv() {
            if let Event::BatchComplete {
                succeeded, failed, ..
            } = event
            {
                assert_eq!(succeeded, 4);
                assert_eq!(failed, 1);
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }
}
