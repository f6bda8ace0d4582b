//! Mirror pool provider.
//!
//! Walks a frozen snapshot of the directory, asks each mirror for the
//! content's format list, and returns the first exact format match whose
//! rewritten URL passes the liveness probe. Mirrors that fail at the
//! transport level are evicted once the pass is over.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{Provider, ResolutionOutcome, StreamCandidate, MIRROR_PROVIDER};
use crate::canonical::canonicalize;
use crate::config::ResolverConfig;
use crate::directory::{DirectorySnapshot, Instance, InstanceDirectory};
use crate::error::ResolveError;
use crate::http_client::{FetchError, MirrorClient};
use crate::prober::CandidateProber;

/// Resolves through the self-reported mirror pool.
pub struct MirrorProvider {
    directory: Arc<InstanceDirectory>,
    client: MirrorClient,
    prober: CandidateProber,
    metadata_timeout: Duration,
    probe_timeout: Duration,
}

/// What a single mirror had to say.
#[derive(Debug)]
enum InstanceResult {
    Found(StreamCandidate),
    /// Answered, but without the requested format.
    NoFormat,
    /// Answered 4xx for this content.
    Unavailable(reqwest::StatusCode),
    /// Had the format, but the rewritten URL failed the probe.
    Inaccessible,
    /// Transport or parse failure; the mirror gets evicted.
    Unreachable(String),
}

#[derive(Default)]
struct PassTally {
    tried: HashSet<Instance>,
    evicted: Vec<Instance>,
}

impl MirrorProvider {
    pub fn new(directory: Arc<InstanceDirectory>, client: MirrorClient) -> Self {
        Self {
            directory,
            prober: CandidateProber::new(client.clone()),
            client,
            metadata_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(
        config: &ResolverConfig,
        directory: Arc<InstanceDirectory>,
        client: MirrorClient,
    ) -> Self {
        Self::new(directory, client)
            .with_metadata_timeout(config.metadata_timeout())
            .with_probe_timeout(config.probe_timeout())
    }

    #[must_use]
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn metadata_url(instance: &Instance, content_id: &str) -> String {
        format!(
            "{}/api/v1/videos/{}",
            instance.base_url(),
            urlencoding::encode(content_id)
        )
    }

    /// One pass over `snapshot` in directory order, skipping instances
    /// already tried.
    async fn run_pass(
        &self,
        snapshot: &DirectorySnapshot,
        content_id: &str,
        format_hint: &str,
        tally: &mut PassTally,
    ) -> Option<StreamCandidate> {
        let mut pending = Vec::new();
        let mut found = None;

        for instance in &snapshot.instances {
            if !tally.tried.insert(instance.clone()) {
                continue;
            }

            match self.try_instance(instance, content_id, format_hint).await {
                InstanceResult::Found(candidate) => {
                    found = Some(candidate);
                    break;
                }
                InstanceResult::NoFormat => {
                    debug!(%instance, "{}", ResolveError::NoFormatMatch(format_hint.to_string()));
                }
                InstanceResult::Unavailable(status) => {
                    debug!(%instance, %status, "Mirror does not serve this content");
                }
                InstanceResult::Inaccessible => {
                    debug!(%instance, "Stream URL failed liveness probe");
                }
                InstanceResult::Unreachable(reason) => {
                    warn!(%instance, %reason, "Mirror unreachable, evicting after pass");
                    pending.push(instance.clone());
                }
            }
        }

        // Evictions touch the shared directory only after the pass.
        self.directory.evict_all(&pending);
        tally.evicted.extend(pending);
        found
    }

    #[instrument(skip(self, instance, format_hint), fields(instance = %instance))]
    async fn try_instance(
        &self,
        instance: &Instance,
        content_id: &str,
        format_hint: &str,
    ) -> InstanceResult {
        let url = Self::metadata_url(instance, content_id);
        let metadata: VideoMetadata = match self.client.get_json(&url, self.metadata_timeout).await {
            Ok(metadata) => metadata,
            Err(FetchError::Status(status)) if status.is_client_error() => {
                return InstanceResult::Unavailable(status);
            }
            Err(e) => return InstanceResult::Unreachable(e.to_string()),
        };

        let Some(upstream) = metadata.stream_url_for(format_hint) else {
            return InstanceResult::NoFormat;
        };

        let stream_url = match canonicalize(upstream, instance) {
            Ok(url) => url,
            Err(e) => return InstanceResult::Unreachable(format!("unusable stream URL: {e}")),
        };

        if !self.prober.is_accessible(&stream_url, self.probe_timeout).await {
            return InstanceResult::Inaccessible;
        }

        InstanceResult::Found(StreamCandidate {
            provider: MIRROR_PROVIDER.to_string(),
            source_instance: Some(instance.clone()),
            stream_url,
            format_tag: format_hint.to_string(),
        })
    }
}

#[async_trait]
impl Provider for MirrorProvider {
    fn name(&self) -> &str {
        MIRROR_PROVIDER
    }

    async fn resolve(&self, content_id: &str, format_hint: &str) -> ResolutionOutcome {
        let mut snapshot = match self.directory.current().await {
            Ok(snapshot) => snapshot,
            Err(e) => return ResolutionOutcome::Hard(e),
        };

        let mut tally = PassTally::default();
        let mut forced_refresh = false;

        loop {
            debug!(instances = snapshot.len(), forced_refresh, "Starting mirror pass");
            if let Some(candidate) = self
                .run_pass(&snapshot, content_id, format_hint, &mut tally)
                .await
            {
                return ResolutionOutcome::Success(candidate);
            }

            let all_unreachable = tally.evicted.len() == tally.tried.len();
            if forced_refresh || !all_unreachable {
                break;
            }

            // At most one forced refresh per request.
            forced_refresh = true;
            info!("No reachable mirror in pool, forcing one directory refresh");
            snapshot = match self.directory.refresh().await {
                Ok(snapshot) => snapshot,
                Err(e) => return ResolutionOutcome::Hard(e),
            };
        }

        if !tally.tried.is_empty() && tally.evicted.len() == tally.tried.len() {
            return ResolutionOutcome::Hard(ResolveError::NoAccessibleMirror(format!(
                "all {} mirrors unreachable",
                tally.tried.len()
            )));
        }

        debug!(tried = tally.tried.len(), "No mirror matched");
        ResolutionOutcome::NoMatch
    }
}

// Serde structures for the mirror metadata response
#[derive(Debug, Deserialize)]
struct VideoMetadata {
    #[serde(default, rename = "adaptiveFormats")]
    adaptive_formats: Vec<AdaptiveFormat>,
}

impl VideoMetadata {
    /// Upstream URL of the format whose itag equals `format_hint` exactly.
    fn stream_url_for(&self, format_hint: &str) -> Option<&str> {
        self.adaptive_formats
            .iter()
            .filter(|f| f.itag.as_ref().is_some_and(|tag| tag.matches(format_hint)))
            .find_map(|f| f.url.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AdaptiveFormat {
    #[serde(default)]
    itag: Option<Itag>,
    #[serde(default)]
    url: Option<String>,
}

/// Mirrors report itags as numbers or as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Itag {
    Number(u64),
    Text(String),
}

impl Itag {
    fn matches(&self, format_hint: &str) -> bool {
        match self {
            Self::Number(n) => n.to_string() == format_hint,
            Self::Text(s) => s == format_hint,
        }
    }
}
