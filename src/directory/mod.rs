//! Live pool of mirror instances.
//!
//! # Architecture
//!
//! - [`Instance`]: a normalized mirror base URL
//! - [`DirectorySnapshot`]: an immutable, ordered list of instances plus fetch time
//! - [`InstanceDirectory`]: the single slot holding the current snapshot
//! - [`DirectorySource`]: where base URLs come from
//!
//! The slot is swapped atomically; readers hold an `Arc` to one complete
//! snapshot and never see a partially updated set. Refreshes are serialized,
//! and a caller that arrives while a refresh is running waits for it and
//! takes its result instead of fetching again.
//!
//! Instances keep the order the sources reported them in (configured source
//! order, then position within each document); mirrors are tried in that order.

mod source;

pub use source::{DirectorySource, HttpDirectorySource, StaticDirectorySource};

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::http_client::MirrorClient;

/// Shortest period accepted by the background refresh timer.
const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(10);

/// A mirror, identified by its normalized base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instance {
    base_url: String,
}

impl Instance {
    /// Normalize a raw base URL. Returns `None` unless it is an absolute
    /// `http`/`https` URL with a host.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        let url = Url::parse(trimmed).ok()?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }
        Some(Self {
            base_url: trimmed.to_string(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)
    }
}

/// One complete view of the mirror pool.
///
/// `fetched_at` is for display; staleness is measured on the monotonic clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub instances: Vec<Instance>,
    pub fetched_at: DateTime<Utc>,
    refreshed_at: Instant,
}

impl DirectorySnapshot {
    /// Build a snapshot from `instances`, dropping repeats but keeping the
    /// first-seen order.
    pub fn new(instances: impl IntoIterator<Item = Instance>) -> Self {
        let mut seen = HashSet::new();
        Self {
            instances: instances
                .into_iter()
                .filter(|i| seen.insert(i.clone()))
                .collect(),
            fetched_at: Utc::now(),
            refreshed_at: Instant::now(),
        }
    }

    /// Time since the instance list was last (re)installed.
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }

    /// `true` once the snapshot is older than `interval`.
    pub fn is_stale(&self, interval: Duration) -> bool {
        self.age() > interval
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, instance: &Instance) -> bool {
        self.instances.contains(instance)
    }

    fn without(&self, evicted: &[Instance]) -> Self {
        Self {
            instances: self
                .instances
                .iter()
                .filter(|i| !evicted.contains(i))
                .cloned()
                .collect(),
            fetched_at: self.fetched_at,
            refreshed_at: self.refreshed_at,
        }
    }
}

/// Owner of the current [`DirectorySnapshot`].
pub struct InstanceDirectory {
    client: MirrorClient,
    sources: Vec<Box<dyn DirectorySource>>,
    banned: HashSet<Instance>,
    refresh_interval: Duration,
    fetch_timeout: Duration,
    slot: ArcSwapOption<DirectorySnapshot>,
    refresh_lock: Mutex<()>,
    completed_refreshes: AtomicU64,
}

impl InstanceDirectory {
    pub fn new(client: MirrorClient, sources: Vec<Box<dyn DirectorySource>>) -> Self {
        Self {
            client,
            sources,
            banned: HashSet::new(),
            refresh_interval: Duration::from_secs(15 * 60),
            fetch_timeout: Duration::from_secs(10),
            slot: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
            completed_refreshes: AtomicU64::new(0),
        }
    }

    /// Build the directory described by `config`: one HTTP source per
    /// configured URL, plus pinned instances if any.
    pub fn from_config(config: &ResolverConfig, client: MirrorClient) -> Self {
        let mut sources: Vec<Box<dyn DirectorySource>> = config
            .directory_sources
            .iter()
            .map(|url| Box::new(HttpDirectorySource::new(url.clone())) as Box<dyn DirectorySource>)
            .collect();
        if !config.static_instances.is_empty() {
            sources.push(Box::new(StaticDirectorySource::new(
                config.static_instances.clone(),
            )));
        }

        Self::new(client, sources)
            .with_banned(config.banned_instances.iter().filter_map(|b| Instance::parse(b)))
            .with_refresh_interval(config.refresh_interval())
            .with_fetch_timeout(config.directory_timeout())
    }

    #[must_use]
    pub fn with_banned(mut self, banned: impl IntoIterator<Item = Instance>) -> Self {
        self.banned.extend(banned);
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Latest snapshot without triggering a refresh.
    pub fn peek(&self) -> Option<Arc<DirectorySnapshot>> {
        self.slot.load_full()
    }

    /// Latest snapshot, refreshed first if missing or stale.
    ///
    /// On cold start this does not return before one fetch attempt has
    /// completed.
    pub async fn current(&self) -> Result<Arc<DirectorySnapshot>> {
        if let Some(snapshot) = self.slot.load_full() {
            if !snapshot.is_stale(self.refresh_interval) {
                return Ok(snapshot);
            }
            debug!(fetched_at = %snapshot.fetched_at, "Directory snapshot is stale");
        }
        self.refresh().await
    }

    /// Query every source and install the union as the new snapshot.
    ///
    /// If all sources fail, the previous snapshot stays installed (re-stamped
    /// so it is served for one more interval). Only a failure with no
    /// previous snapshot is an error.
    pub async fn refresh(&self) -> Result<Arc<DirectorySnapshot>> {
        let seen = self.completed_refreshes.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.completed_refreshes.load(Ordering::Acquire) != seen {
            debug!("Joined a directory refresh that was already in flight");
            return self.slot.load_full().ok_or_else(|| {
                ResolveError::DirectoryUnavailable("directory refresh failed".to_string())
            });
        }

        let fetched = self.fetch_union().await;
        let result = match fetched {
            Ok(instances) => {
                let snapshot = Arc::new(DirectorySnapshot::new(instances));
                self.slot.store(Some(Arc::clone(&snapshot)));
                info!(instances = snapshot.len(), "Directory refreshed");
                Ok(snapshot)
            }
            Err(reason) => match self.slot.load_full() {
                Some(previous) if previous.is_empty() => {
                    // Everything was evicted; nothing worth re-stamping.
                    warn!(%reason, "Directory refresh failed, pool is empty");
                    Ok(previous)
                }
                Some(previous) => {
                    warn!(
                        %reason,
                        instances = previous.len(),
                        "Directory refresh failed, keeping previous snapshot"
                    );
                    let kept = Arc::new(DirectorySnapshot::new(previous.instances.clone()));
                    self.slot.store(Some(Arc::clone(&kept)));
                    Ok(kept)
                }
                None => {
                    warn!(%reason, "Directory refresh failed with no cached snapshot");
                    Err(ResolveError::DirectoryUnavailable(reason))
                }
            },
        };

        self.completed_refreshes.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Remove one instance from the current snapshot until the next refresh.
    pub fn evict(&self, instance: &Instance) {
        self.evict_all(std::slice::from_ref(instance));
    }

    /// Remove several instances in one swap.
    pub fn evict_all(&self, instances: &[Instance]) {
        if instances.is_empty() {
            return;
        }
        self.slot.rcu(|current| {
            current
                .as_ref()
                .map(|snapshot| Arc::new(snapshot.without(instances)))
        });
        debug!(count = instances.len(), "Evicted instances from directory");
    }

    /// Refresh on a fixed timer until `shutdown` is cancelled.
    ///
    /// The first refresh happens one interval after spawning; call
    /// [`current`](Self::current) beforehand for the cold-start fetch.
    pub fn spawn_refresh_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        let period = directory.refresh_interval.max(MIN_REFRESH_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Directory refresh task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = directory.refresh().await {
                            warn!("Background directory refresh failed: {e}");
                        }
                    }
                }
            }
        })
    }

    async fn fetch_union(&self) -> std::result::Result<Vec<Instance>, String> {
        if self.sources.is_empty() {
            return Err("no directory sources configured".to_string());
        }

        let fetches = self.sources.iter().map(|source| async move {
            let result =
                tokio::time::timeout(self.fetch_timeout, source.fetch(&self.client, self.fetch_timeout))
                    .await
                    .unwrap_or_else(|_| {
                        Err(anyhow::anyhow!("timed out after {:?}", self.fetch_timeout))
                    });
            (source.name(), result)
        });

        let mut seen = HashSet::new();
        let mut instances = Vec::new();
        let mut failures = Vec::new();
        let mut any_ok = false;

        for (name, result) in join_all(fetches).await {
            match result {
                Ok(urls) => {
                    any_ok = true;
                    debug!(source = name, reported = urls.len(), "Directory source answered");
                    for raw in urls {
                        match Instance::parse(&raw) {
                            Some(instance) if self.banned.contains(&instance) => {
                                debug!(%instance, "Skipping banned instance");
                            }
                            Some(instance) => {
                                if seen.insert(instance.clone()) {
                                    instances.push(instance);
                                }
                            }
                            None => debug!(raw = %raw, "Skipping malformed instance URL"),
                        }
                    }
                }
                Err(e) => {
                    warn!(source = name, "Directory source failed: {e:#}");
                    failures.push(format!("{name}: {e:#}"));
                }
            }
        }

        if !any_ok {
            return Err(format!("all directory sources failed ({})", failures.join("; ")));
        }
        if instances.is_empty() {
            return Err("directory sources reported no usable instances".to_string());
        }
        Ok(instances)
    }
}
