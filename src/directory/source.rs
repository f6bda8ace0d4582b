//! Directory sources: where mirror base URLs come from.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::http_client::MirrorClient;

/// A place that reports candidate mirror base URLs.
///
/// Implementations return raw strings; normalization, deduplication and
/// banning happen in [`InstanceDirectory`](super::InstanceDirectory).
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Human-readable source name for logs.
    fn name(&self) -> &str;

    /// Fetch the current list of base URLs.
    async fn fetch(&self, client: &MirrorClient, timeout: Duration) -> Result<Vec<String>>;
}

/// Remote JSON document of the form `{"invidious": ["https://m1", ...]}`.
pub struct HttpDirectorySource {
    url: String,
}

impl HttpDirectorySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryDocument {
    #[serde(default)]
    invidious: Vec<String>,
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self, client: &MirrorClient, timeout: Duration) -> Result<Vec<String>> {
        let doc: DirectoryDocument = client
            .get_json(&self.url, timeout)
            .await
            .with_context(|| format!("directory source {} failed", self.url))?;
        Ok(doc.invidious)
    }
}

/// Instances pinned in configuration.
pub struct StaticDirectorySource {
    instances: Vec<String>,
}

impl StaticDirectorySource {
    pub fn new(instances: Vec<String>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl DirectorySource for StaticDirectorySource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, _client: &MirrorClient, _timeout: Duration) -> Result<Vec<String>> {
        Ok(self.instances.clone())
    }
}
