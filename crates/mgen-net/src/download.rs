//! Resilient binary downloads.
//!
//! Downloads differ from ordinary calls in that failure can occur while
//! streaming the response body, not just at connection setup, so the
//! per-attempt deadline in the policy covers the full read and defaults
//! to minutes (payloads are video files up to ~100MB).

use tracing::debug;

use crate::client::ResilientClient;
use crate::error::{NetError, NetResult};
use crate::retry::{with_retry, RetryPolicy};

/// Download `url` fully into memory, retrying per `policy`.
///
/// Returns the materialized byte buffer; callers stream to disk themselves
/// when memory pressure matters.
pub async fn download_bytes(
    client: &ResilientClient,
    url: &str,
    policy: &RetryPolicy,
) -> NetResult<Vec<u8>> {
    let http = client.inner().clone();

    with_retry(policy, "download", |attempt| {
        let http = http.clone();
        let url = url.to_string();
        async move {
            debug!(url = %url, attempt, "downloading");

            let response = http.get(&url).send().await.map_err(NetError::from_reqwest)?;
            let status = response.status();
            if !status.is_success() {
                return Err(NetError::Status {
                    status: status.as_u16(),
                    body: format!("download of {url} failed"),
                });
            }

            // The whole body read runs under the attempt deadline.
            let bytes = response.bytes().await.map_err(NetError::from_reqwest)?;
            Ok(bytes.to_vec())
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::download()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_download_returns_full_body() {
        let server = MockServer::start().await;
        let payload = vec![0xABu8; 64 * 1024];

        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .mount(&server)
            .await;

        let client = ResilientClient::new();
        let url = format!("{}/clip.mp4", server.uri());
        let bytes = download_bytes(&client, &url, &fast_policy(2)).await.unwrap();

        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn test_download_retries_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/asset.png"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/asset.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;

        let client = ResilientClient::new();
        let url = format!("{}/asset.png", server.uri());
        let bytes = download_bytes(&client, &url, &fast_policy(3)).await.unwrap();

        assert_eq!(bytes, b"png");
    }

    #[tokio::test]
    async fn test_download_not_found_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResilientClient::new();
        let url = format!("{}/gone", server.uri());
        let err = download_bytes(&client, &url, &fast_policy(3)).await.unwrap_err();

        assert!(matches!(err, NetError::Status { status: 404, .. }));
    }
}
