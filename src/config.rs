//! Resolver configuration loaded from `~/.config/mirrorlink/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Remote document listing the current mirror pool.
pub const DEFAULT_DIRECTORY_SOURCE: &str =
    "https://raw.githubusercontent.com/NitinBot001/Uma/refs/heads/main/dynamic_instances.json";

/// Default format hint (AAC audio, 128 kbps).
pub const DEFAULT_FORMAT: &str = "140";

/// One paid resolution backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SecondaryConfig {
    /// Provider name reported as `method` on success.
    pub name: String,
    /// Fixed endpoint, called as `<endpoint>?id=<content id>`.
    pub endpoint: String,
    /// API key sent in the `api-key` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key, used when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_secondary_timeout")]
    pub timeout_secs: u64,
}

impl SecondaryConfig {
    /// The effective API key, if one is configured and non-empty.
    pub fn resolve_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
            })
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level resolver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// URLs of JSON documents of the form `{"invidious": [...]}`.
    pub directory_sources: Vec<String>,
    /// Instances always included in the pool.
    pub static_instances: Vec<String>,
    /// Instances never included, even when a source reports them.
    pub banned_instances: Vec<String>,
    pub refresh_interval_secs: u64,
    pub directory_timeout_secs: u64,
    pub metadata_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub default_format: String,
    /// Paid backends, tried in order after the mirror pool.
    pub secondary: Vec<SecondaryConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            directory_sources: vec![DEFAULT_DIRECTORY_SOURCE.to_string()],
            static_instances: Vec::new(),
            banned_instances: Vec::new(),
            refresh_interval_secs: 15 * 60,
            directory_timeout_secs: 10,
            metadata_timeout_secs: 5,
            probe_timeout_secs: 5,
            default_format: DEFAULT_FORMAT.to_string(),
            secondary: Vec::new(),
        }
    }
}

impl ResolverConfig {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_secs(self.directory_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_secondary_timeout() -> u64 {
    10
}

/// Return the path to the resolver config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mirrorlink")
        .join("config.toml")
}
