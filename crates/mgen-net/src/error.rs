//! Network error types and retryability classification.

use thiserror::Error;

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;

/// Errors from outbound HTTP calls and downloads.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response body error: {0}")]
    Body(String),
}

impl NetError {
    /// Classify a `reqwest` failure.
    ///
    /// Timeouts, connect failures, and mid-body errors are the transient
    /// symptoms worth retrying; request construction problems are fatal.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Transient(format!("timeout: {e}"));
        }
        if e.is_connect() {
            return Self::Transient(format!("connect: {e}"));
        }
        if e.is_body() || e.is_decode() {
            return Self::Body(e.to_string());
        }
        if e.is_request() {
            // Connection reset / aborted surfaces here on some platforms.
            let msg = e.to_string();
            let lowered = msg.to_lowercase();
            if lowered.contains("reset") || lowered.contains("aborted") || lowered.contains("broken pipe")
            {
                return Self::Transient(msg);
            }
            return Self::InvalidRequest(msg);
        }
        Self::Transient(e.to_string())
    }

    /// Whether the call site should retry this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Timeout(_) | NetError::Transient(_) | NetError::Body(_) => true,
            NetError::Status { status, .. } => *status == 429 || *status >= 500,
            NetError::InvalidRequest(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        let too_many = NetError::Status {
            status: 429,
            body: String::new(),
        };
        let server = NetError::Status {
            status: 503,
            body: String::new(),
        };
        let client = NetError::Status {
            status: 404,
            body: String::new(),
        };

        assert!(too_many.is_retryable());
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_transient_classes_retryable() {
        assert!(NetError::Timeout(60).is_retryable());
        assert!(NetError::Transient("connection reset".into()).is_retryable());
        assert!(NetError::Body("unexpected EOF".into()).is_retryable());
        assert!(!NetError::InvalidRequest("bad url".into()).is_retryable());
    }
}
