//! Resolution orchestration.
//!
//! [`ResolutionService`] owns the directory and the provider chain. The
//! mirror provider brings the directory up to date itself (cold start or
//! stale snapshot), so secondaries never wait on directory state.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ResolverConfig;
use crate::directory::InstanceDirectory;
use crate::error::ResolveError;
use crate::http_client::MirrorClient;
use crate::provider::{
    Attempt, MirrorProvider, ProviderChain, ResolutionOutcome, ResolutionResult, SecondaryProvider,
};

/// Entry point used by front ends.
pub struct ResolutionService {
    directory: Arc<InstanceDirectory>,
    chain: ProviderChain,
}

impl ResolutionService {
    pub fn new(directory: Arc<InstanceDirectory>, chain: ProviderChain) -> Self {
        Self { directory, chain }
    }

    /// Wire the directory, the mirror provider and every usable secondary
    /// described by `config`, in that order.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let client = MirrorClient::new()?;
        let directory = Arc::new(InstanceDirectory::from_config(config, client.clone()));

        let mut chain = ProviderChain::default();
        chain.push(Arc::new(MirrorProvider::from_config(
            config,
            Arc::clone(&directory),
            client.clone(),
        )));

        for secondary in &config.secondary {
            match SecondaryProvider::from_config(secondary, client.clone()) {
                Some(provider) => chain.push(Arc::new(provider)),
                None => warn!(provider = %secondary.name, "No API key configured, skipping provider"),
            }
        }

        info!(providers = ?chain.names(), "Resolution chain ready");
        Ok(Self::new(directory, chain))
    }

    pub fn directory(&self) -> &Arc<InstanceDirectory> {
        &self.directory
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Blocking cold-start fetch followed by the background refresh timer.
    ///
    /// A failed cold start is logged, not returned: the first request will
    /// try again.
    pub async fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        match self.directory.current().await {
            Ok(snapshot) => info!(instances = snapshot.len(), "Directory warmed"),
            Err(e) => warn!("Initial directory fetch failed: {e}"),
        }
        self.directory.spawn_refresh_task(shutdown)
    }

    /// Resolve `content_id` in format `format_hint`.
    #[instrument(skip(self))]
    pub async fn resolve(&self, content_id: &str, format_hint: &str) -> ResolutionResult {
        let content_id = content_id.trim();
        if content_id.is_empty() {
            return ResolutionResult::Failure {
                attempted: vec![Attempt {
                    provider: "request".to_string(),
                    outcome: ResolutionOutcome::Hard(ResolveError::InvalidRequest(
                        "missing content id".to_string(),
                    )),
                }],
            };
        }

        self.chain.execute(content_id, format_hint).await
    }

    /// Like [`resolve`](Self::resolve), but gives up when `cancel` fires.
    ///
    /// Cancellation drops the in-flight request future, which aborts any
    /// outbound call it was waiting on. Returns `None` when cancelled.
    pub async fn resolve_until(
        &self,
        content_id: &str,
        format_hint: &str,
        cancel: &CancellationToken,
    ) -> Option<ResolutionResult> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(content_id, "Resolution cancelled by caller");
                None
            }
            result = self.resolve(content_id, format_hint) => Some(result),
        }
    }
}
