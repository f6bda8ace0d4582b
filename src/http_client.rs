//! Shared HTTP client for directory, mirror and secondary calls.
//!
//! Features:
//! - HTTP/2 when the server negotiates it, HTTP/1.1 otherwise
//! - TLS 1.3 via rustls
//! - Brotli and Gzip compression (auto-negotiated)
//! - Connection pooling with keep-alive
//! - Per-request timeouts (the client has no global timeout)

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!("mirrorlink/", env!("CARGO_PKG_VERSION"));

/// Failure of a single outbound JSON call.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("invalid JSON body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Decode(err)
        } else {
            Self::Transport(err)
        }
    }
}

/// HTTP client shared by every component of the resolver.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct MirrorClient {
    client: Client,
}

impl MirrorClient {
    /// Create a new client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            // ═══════════════════════════════════════════════════════════════
            // CONNECTION REUSE
            // ═══════════════════════════════════════════════════════════════
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            // ═══════════════════════════════════════════════════════════════
            // TLS + COMPRESSION
            // ═══════════════════════════════════════════════════════════════
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            // ═══════════════════════════════════════════════════════════════
            // TIMEOUTS (request timeouts are set per call)
            // ═══════════════════════════════════════════════════════════════
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// GET a URL and decode a JSON body, bounded by `timeout`.
    ///
    /// Non-2xx statuses are reported as [`FetchError::Status`] before any
    /// decoding is attempted.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<T, FetchError> {
        let response = self.send(self.client.get(url), timeout).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))
    }

    /// Send a prepared request with a timeout and reject non-2xx statuses.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> std::result::Result<Response, FetchError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        debug!(status = %response.status(), version = ?response.version(), "Response received");

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response)
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
