//! Resolution providers and the chain that runs them.
//!
//! A [`Provider`] knows one way of turning a content id into a stream URL:
//! the mirror pool ([`MirrorProvider`]) or a single paid API
//! ([`SecondaryProvider`]). Each reports a uniform [`ResolutionOutcome`] so
//! the [`ProviderChain`] can treat them identically.

mod chain;
mod mirror;
mod secondary;

pub use chain::{Attempt, ProviderChain, ResolutionResult};
pub use mirror::MirrorProvider;
pub use secondary::SecondaryProvider;

use async_trait::async_trait;

use crate::directory::Instance;
use crate::error::ResolveError;

/// Name reported by [`MirrorProvider`].
pub const MIRROR_PROVIDER: &str = "mirror";

/// A playable stream found by one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCandidate {
    /// Name of the provider that produced it.
    pub provider: String,
    /// Mirror that issued the URL, for mirror results.
    pub source_instance: Option<Instance>,
    pub stream_url: String,
    /// Format identifier (itag) of the stream.
    pub format_tag: String,
}

/// Result of one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Success(StreamCandidate),
    /// The provider worked but had nothing for this request.
    NoMatch,
    /// Soft failure (quota, rate limit). Worth trying elsewhere.
    Transient(ResolveError),
    /// The provider failed outright.
    Hard(ResolveError),
}

impl ResolutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The error carried by a failed outcome.
    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            Self::Transient(e) | Self::Hard(e) => Some(e),
            Self::Success(_) | Self::NoMatch => None,
        }
    }

    /// Short label for logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::NoMatch => "no-match",
            Self::Transient(_) => "transient",
            Self::Hard(_) => "hard",
        }
    }
}

/// One resolution strategy in the fallback chain.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name (e.g., `"mirror"`, or a configured backend name).
    fn name(&self) -> &str;

    /// Make one attempt at resolving `content_id` in format `format_hint`.
    async fn resolve(&self, content_id: &str, format_hint: &str) -> ResolutionOutcome;
}
