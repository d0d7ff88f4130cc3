//! Provider error types.

use thiserror::Error;

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from external generative services.
///
/// Semantic failures (rejected analysis, failed jobs) are distinct from
/// transport errors: the HTTP layer never retries them; the owning stage
/// decides whether to retry the whole stage or fail the task.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The model's response did not satisfy the declared schema or did
    /// not finish normally. Never retried at this layer.
    #[error("analysis rejected: {0}")]
    AnalysisRejected(String),

    /// The response body was missing expected fields.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// A generation job reached a terminal failure state.
    #[error("generation job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("network error: {0}")]
    Net(#[from] mgen_net::NetError),

    #[error("provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether a whole-stage retry could plausibly succeed.
    ///
    /// Semantic rejections are deterministic for the same input; job
    /// failures and transport errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::AnalysisRejected(_) => false,
            ProviderError::InvalidResponse(_) => false,
            ProviderError::Config(_) => false,
            ProviderError::JobFailed { .. } => true,
            ProviderError::Net(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_failures_not_retryable() {
        assert!(!ProviderError::AnalysisRejected("finish_reason=length".into()).is_retryable());
        assert!(!ProviderError::invalid_response("missing url").is_retryable());
        assert!(ProviderError::JobFailed {
            job_id: "j1".into(),
            reason: "worker died".into()
        }
        .is_retryable());
    }
}
