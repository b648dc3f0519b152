//! HTTP transport abstraction
//!
//! The fetcher talks to the network through the [`ResourceClient`] trait so
//! tests can substitute deterministic implementations (fixed responses,
//! injected delays, simulated outages) without a real server.

use async_trait::async_trait;
use url::Url;

/// A complete HTTP response: status code plus the full body
#[derive(Clone, Debug)]
pub struct RemoteResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

/// Transport-level failure: the request never produced an HTTP response
/// (connection refused, DNS resolution failure, reset mid-body, ...)
#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Minimal GET-only client the fetcher is written against
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Issue a single GET and return the complete response.
    ///
    /// A non-200 status is a normal return, not an error; `Err` means the
    /// transport itself failed.
    async fn get(&self, url: &Url) -> Result<RemoteResponse, TransportError>;
}

/// Production [`ResourceClient`] backed by a shared [`reqwest::Client`]
#[derive(Clone, Debug, Default)]
pub struct HttpResourceClient {
    client: reqwest::Client,
}

impl HttpResourceClient {
    /// Create a client with reqwest's default transport settings.
    ///
    /// No timeout override is applied; the transport default governs.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn get(&self, url: &Url) -> Result<RemoteResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        // A body that fails mid-read never yielded a usable response either
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(RemoteResponse {
            status,
            body: body.to_vec(),
        })
    }
}
