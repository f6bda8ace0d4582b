//! Paid resolution API provider.
//!
//! One instance per backend/API key. The backend is called once per request
//! as `GET <endpoint>?id=<content id>` with an `api-key` header and answers
//! `{"status": "ok", "link": "..."}` on success.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Provider, ResolutionOutcome, StreamCandidate};
use crate::config::SecondaryConfig;
use crate::error::ResolveError;
use crate::http_client::MirrorClient;

/// Lowercase fragments of `msg` that indicate a quota or rate limit.
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "limit exceeded",
    "limit reached",
    "too many requests",
];

pub struct SecondaryProvider {
    name: String,
    endpoint: String,
    api_key: String,
    client: MirrorClient,
    timeout: Duration,
}

impl SecondaryProvider {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        client: MirrorClient,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
            timeout: Duration::from_secs(10),
        }
    }

    /// Build from configuration. Returns `None` when no API key is available.
    pub fn from_config(config: &SecondaryConfig, client: MirrorClient) -> Option<Self> {
        let key = config.resolve_key()?;
        Some(
            Self::new(config.name.clone(), config.endpoint.clone(), key, client)
                .with_timeout(config.timeout()),
        )
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Map a backend answer to an outcome. No I/O.
    fn classify(
        &self,
        status: StatusCode,
        body: Option<SecondaryResponse>,
        format_hint: &str,
    ) -> ResolutionOutcome {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ResolutionOutcome::Transient(ResolveError::ProviderQuotaExceeded(format!(
                "{}: HTTP {status}",
                self.name
            )));
        }

        let Some(body) = body else {
            return ResolutionOutcome::Hard(ResolveError::ProviderHardFailure(format!(
                "{}: HTTP {status} with unreadable body",
                self.name
            )));
        };

        let ok = status.is_success() && body.status.as_deref() == Some("ok");
        // An explicit success wins over whatever `msg` says.
        if let Some(link) = body.link.filter(|link| ok && !link.is_empty()) {
            return ResolutionOutcome::Success(StreamCandidate {
                provider: self.name.clone(),
                source_instance: None,
                stream_url: link,
                format_tag: format_hint.to_string(),
            });
        }

        let msg = body.msg.unwrap_or_default();
        if is_quota_message(&msg) {
            return ResolutionOutcome::Transient(ResolveError::ProviderQuotaExceeded(format!(
                "{}: {msg}",
                self.name
            )));
        }

        ResolutionOutcome::Hard(ResolveError::ProviderHardFailure(format!(
            "{}: HTTP {status}, status {:?}, msg {msg:?}",
            self.name,
            body.status.as_deref().unwrap_or("")
        )))
    }
}

fn is_quota_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    QUOTA_MARKERS.iter().any(|marker| msg.contains(marker))
}

#[async_trait]
impl Provider for SecondaryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, format_hint), fields(provider = %self.name))]
    async fn resolve(&self, content_id: &str, format_hint: &str) -> ResolutionOutcome {
        let request = self
            .client
            .inner()
            .get(&self.endpoint)
            .query(&[("id", content_id)])
            .header("api-key", &self.api_key)
            .timeout(self.timeout);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return ResolutionOutcome::Hard(ResolveError::ProviderHardFailure(format!(
                    "{}: {e}",
                    self.name
                )));
            }
        };

        let status = response.status();
        debug!(%status, "Secondary provider answered");
        let body = response.json::<SecondaryResponse>().await.ok();
        self.classify(status, body, format_hint)
    }
}

// Serde structure for the secondary API response
#[derive(Debug, Deserialize)]
struct SecondaryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}
