//! JSON shape handed to front ends.

use serde::Serialize;

use crate::provider::ResolutionResult;

/// Body of a resolution response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResolutionResponse {
    Found {
        video_id: String,
        stream_url: String,
        itag: String,
        method: String,
    },
    Error {
        error: String,
    },
}

impl ResolutionResult {
    /// Response body and HTTP status for `content_id`.
    ///
    /// The id is trimmed the same way
    /// [`ResolutionService::resolve`](crate::ResolutionService::resolve) trims it.
    pub fn into_response(self, content_id: &str) -> (u16, ResolutionResponse) {
        let status = self.status_code();
        let body = match self {
            Self::Success(candidate) => ResolutionResponse::Found {
                video_id: content_id.trim().to_string(),
                stream_url: candidate.stream_url,
                itag: candidate.format_tag,
                method: candidate.provider,
            },
            failure @ Self::Failure { .. } => ResolutionResponse::Error {
                error: failure
                    .reason()
                    .map(|reason| reason.to_string())
                    .unwrap_or_default(),
            },
        };
        (status, body)
    }
}
