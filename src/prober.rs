//! Liveness probe for candidate stream URLs.
//!
//! A mirror answering `200 OK` is not enough: some return an empty body or
//! an HTML error page with a success status. A candidate counts as
//! accessible only when it answers 2xx with a non-HTML content type and
//! delivers at least one body byte within the timeout.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, RANGE};
use tracing::{debug, instrument};

use crate::http_client::MirrorClient;

/// Byte range requested so mirrors do not start a full transfer.
const PROBE_RANGE: &str = "bytes=0-1023";

/// Checks that a fully-built URL actually serves content.
#[derive(Debug, Clone)]
pub struct CandidateProber {
    client: MirrorClient,
}

impl CandidateProber {
    pub fn new(client: MirrorClient) -> Self {
        Self { client }
    }

    /// One bounded probe of `url`. Never retries.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn is_accessible(&self, url: &str, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.probe(url, timeout)).await {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                debug!(%reason, "Probe rejected candidate");
                false
            }
            Err(_) => {
                debug!(?timeout, "Probe timed out");
                false
            }
        }
    }

    async fn probe(&self, url: &str, timeout: Duration) -> Result<(), String> {
        let request = self.client.inner().get(url).header(RANGE, PROBE_RANGE);
        let mut response = self
            .client
            .send(request, timeout)
            .await
            .map_err(|e| e.to_string())?;

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html"));
        if is_html {
            return Err("HTML error page".to_string());
        }

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) if !chunk.is_empty() => return Ok(()),
                Ok(Some(_)) => {}
                Ok(None) => return Err("empty body".to_string()),
                Err(e) => return Err(format!("body read failed: {e}")),
            }
        }
    }
}
