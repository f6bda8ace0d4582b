//! Ordered execution of providers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Provider, ResolutionOutcome, StreamCandidate};
use crate::error::ResolveError;

/// One provider's entry in the attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub provider: String,
    pub outcome: ResolutionOutcome,
}

/// Final answer for one resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    Success(StreamCandidate),
    /// Every provider was tried; `attempted` is in chain order.
    Failure { attempted: Vec<Attempt> },
}

impl ResolutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The single reason reported for a failure.
    ///
    /// This is the first error recorded in chain order; if every provider
    /// merely had no match, it is [`ResolveError::NoAccessibleMirror`].
    pub fn reason(&self) -> Option<ResolveError> {
        match self {
            Self::Success(_) => None,
            Self::Failure { attempted } => Some(
                attempted
                    .iter()
                    .find_map(|a| a.outcome.error().cloned())
                    .unwrap_or_else(|| {
                        ResolveError::NoAccessibleMirror("no provider returned a stream".to_string())
                    }),
            ),
        }
    }

    /// HTTP status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        self.reason().map_or(200, |e| e.status_code())
    }
}

/// Providers in priority order.
///
/// Providers are run one after another. The first success wins; every other
/// outcome (no match, transient, hard) moves on to the next provider. The
/// list is walked exactly once per request.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Append a provider at the lowest priority.
    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn execute(&self, content_id: &str, format_hint: &str) -> ResolutionResult {
        let mut attempted = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            debug!(provider = provider.name(), content_id, "Trying provider");
            let outcome = provider.resolve(content_id, format_hint).await;

            match &outcome {
                ResolutionOutcome::Success(candidate) => {
                    info!(
                        provider = provider.name(),
                        content_id,
                        url = %candidate.stream_url,
                        "Resolved stream"
                    );
                    return ResolutionResult::Success(candidate.clone());
                }
                ResolutionOutcome::NoMatch => {
                    debug!(provider = provider.name(), "No match, trying next provider");
                }
                ResolutionOutcome::Transient(e) => {
                    info!(provider = provider.name(), "Transient failure, trying next provider: {e}");
                }
                ResolutionOutcome::Hard(e) => {
                    warn!(provider = provider.name(), "Provider failed, trying next provider: {e}");
                }
            }

            attempted.push(Attempt {
                provider: provider.name().to_string(),
                outcome,
            });
        }

        warn!(content_id, attempts = attempted.len(), "All providers exhausted");
        ResolutionResult::Failure { attempted }
    }
}
