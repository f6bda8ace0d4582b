//! Resolution error taxonomy.
//!
//! Every provider failure is expressed as a [`ResolveError`] so the chain
//! executor can record it in the attempt log without knowing which backend
//! produced it. Errors are `Clone` because they live inside
//! [`ResolutionOutcome`](crate::provider::ResolutionOutcome) values.

use thiserror::Error;

/// Resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Every directory source failed and no cached snapshot exists.
    #[error("No mirror instances available: {0}")]
    DirectoryUnavailable(String),

    /// The directory had instances, but none produced an accessible stream.
    #[error("No suitable accessible stream URL found: {0}")]
    NoAccessibleMirror(String),

    /// A paid backend reported a quota or rate limit. The chain continues.
    #[error("Provider quota exceeded: {0}")]
    ProviderQuotaExceeded(String),

    /// A single provider failed outright. The chain continues.
    #[error("Provider failed: {0}")]
    ProviderHardFailure(String),

    /// The requested format is not offered by a mirror.
    #[error("Format {0} not available")]
    NoFormatMatch(String),

    /// The request itself cannot be resolved (e.g. an empty content id).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ResolveError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable(_) => "DirectoryUnavailable",
            Self::NoAccessibleMirror(_) => "NoAccessibleMirror",
            Self::ProviderQuotaExceeded(_) => "ProviderQuotaExceeded",
            Self::ProviderHardFailure(_) => "ProviderHardFailure",
            Self::NoFormatMatch(_) => "NoFormatMatch",
            Self::InvalidRequest(_) => "InvalidRequest",
        }
    }

    /// HTTP status class a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            _ => 404,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
