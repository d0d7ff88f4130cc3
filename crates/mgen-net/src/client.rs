//! Resilient HTTP client.

use reqwest::{RequestBuilder, Response};
use tracing::debug;

use crate::error::{NetError, NetResult};
use crate::retry::{with_retry, RetryPolicy};

/// Thin wrapper over `reqwest::Client` that applies a retry policy and
/// converts non-2xx responses into classified errors.
#[derive(Debug, Clone, Default)]
pub struct ResilientClient {
    http: reqwest::Client,
}

impl ResilientClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing client (shared connection pool).
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Access the underlying client for request building.
    pub fn inner(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request built by `build`, retrying per `policy`.
    ///
    /// `build` is called once per attempt so request bodies are rebuilt
    /// rather than cloned across retries.
    pub async fn send_with_retry<F>(
        &self,
        policy: &RetryPolicy,
        operation: &str,
        build: F,
    ) -> NetResult<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        with_retry(policy, operation, |attempt| {
            let request = build(&self.http);
            async move {
                debug!(operation = %operation, attempt, "sending request");
                let response = request.send().await.map_err(NetError::from_reqwest)?;
                check_status(response).await
            }
        })
        .await
    }
}

/// Convert a non-success response into a `NetError::Status`.
async fn check_status(response: Response) -> NetResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let truncated = if body.len() > 512 {
        format!("{}...", &body[..512])
    } else {
        body
    };
    Err(NetError::Status {
        status: status.as_u16(),
        body: truncated,
    })
}
