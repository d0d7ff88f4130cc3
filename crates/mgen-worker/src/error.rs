//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Task {0} is already running")]
    AlreadyRunning(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    #[error("Provider error: {0}")]
    Provider(#[from] mgen_providers::ProviderError),

    #[error("Network error: {0}")]
    Net(#[from] mgen_net::NetError),

    #[error("Media error: {0}")]
    Media(#[from] mgen_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] mgen_storage::StorageError),

    #[error("Task store error: {0}")]
    TaskStore(#[from] mgen_tasks::TaskStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    /// Whether retrying the surrounding stage could plausibly succeed.
    ///
    /// Validation, semantic analysis failures, and subprocess failures are
    /// deterministic; transport and upstream-job failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Validation(_)
            | WorkerError::AlreadyRunning(_)
            | WorkerError::TaskNotFound(_)
            | WorkerError::AnalysisFailed(_)
            | WorkerError::Media(_) => false,
            WorkerError::GenerationFailed(_) | WorkerError::GenerationTimeout(_) => true,
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::Net(e) => e.is_retryable(),
            WorkerError::Storage(_) | WorkerError::TaskStore(_) | WorkerError::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subprocess_failures_are_fatal() {
        let err = WorkerError::Media(mgen_media::MediaError::ffmpeg_failed(
            "non-zero exit",
            None,
            Some(1),
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_generation_failures_are_retryable() {
        assert!(WorkerError::generation_failed("job failed").is_retryable());
        assert!(WorkerError::GenerationTimeout(600).is_retryable());
        assert!(!WorkerError::validation("missing reference image").is_retryable());
    }
}
