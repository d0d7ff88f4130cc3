//! Retry policy and the shared retry combinator.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{NetError, NetResult};

/// Call-site retry configuration.
///
/// Not persisted anywhere; each call site picks a policy and passes it in.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Base delay; attempt k waits `base_delay * 2^(k-1)`.
    pub base_delay: Duration,
    /// Cap applied to the computed backoff delay.
    pub max_delay: Duration,
    /// Per-attempt deadline.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy for ordinary API calls.
    pub fn http() -> Self {
        Self::default()
    }

    /// Policy for asset-generation calls, which run much longer.
    pub fn generation() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            ..Self::default()
        }
    }

    /// Policy for large binary downloads: the deadline must cover the
    /// whole body read, and payloads run to ~100MB.
    pub fn download() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(600),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Backoff delay after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

/// Execute `op` under `policy`, retrying transient failures.
///
/// Each attempt runs under the policy's deadline; a structured log line is
/// emitted per attempt with its index, elapsed time, and outcome. Fatal
/// errors surface immediately; the last error is returned once attempts
/// are exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, op: F) -> NetResult<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = NetResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let started = Instant::now();

        let result = match tokio::time::timeout(policy.timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(NetError::Timeout(policy.timeout.as_secs())),
        };

        match result {
            Ok(value) => {
                debug!(
                    operation = %operation,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "attempt succeeded"
                );
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation = %operation,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(
                    operation = %operation,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "giving up: {e}"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_millis(200))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_caps_at_max_delay() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(5), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(NetError::Transient("reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: NetResult<()> = with_retry(&fast_policy(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(NetError::Transient("reset".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: NetResult<()> = with_retry(&fast_policy(5), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(NetError::Status {
                    status: 400,
                    body: "bad input".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_deadline_is_enforced() {
        let calls = AtomicU32::new(0);
        let result: NetResult<()> = with_retry(&fast_policy(2), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                // Never resolves; the per-attempt timeout must fire.
                std::future::pending::<()>().await;
                unreachable!()
            }
        })
        .await;

        assert!(matches!(result, Err(NetError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
