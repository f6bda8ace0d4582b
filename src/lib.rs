//! `mirrorlink` - content id to stream URL resolution
//!
//! # Features
//!
//! - **Mirror pool**: a live set of mirror instances refreshed from remote
//!   directory documents, with stale-but-usable snapshots kept on failure
//! - **Liveness probing**: candidates must deliver real bytes, not just `200`
//! - **Proxy rewriting**: upstream media URLs rewritten against the mirror
//!   that issued them
//! - **Fallback chain**: paid APIs tried in order when the pool comes up empty
//!
//! # Example
//!
//! ```rust,no_run
//! use mirrorlink::{ResolutionService, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = ResolutionService::from_config(&ResolverConfig::load()?)?;
//!     let (status, body) = service.resolve("dQw4w9WgXcQ", "140").await.into_response("dQw4w9WgXcQ");
//!     println!("{status} {}", serde_json::to_string(&body)?);
//!     Ok(())
//! }
//! ```

pub mod canonical;
pub mod config;
pub mod directory;
pub mod error;
pub mod http_client;
pub mod prober;
pub mod provider;
pub mod response;
pub mod service;

pub use canonical::canonicalize;
pub use config::{ResolverConfig, SecondaryConfig};
pub use directory::{DirectorySnapshot, DirectorySource, Instance, InstanceDirectory};
pub use error::ResolveError;
pub use http_client::MirrorClient;
pub use prober::CandidateProber;
pub use provider::{
    MirrorProvider, Provider, ProviderChain, ResolutionOutcome, ResolutionResult,
    SecondaryProvider, StreamCandidate,
};
pub use response::ResolutionResponse;
pub use service::ResolutionService;

/// Version of mirrorlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
