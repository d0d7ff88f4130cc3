//! Video generation client with job polling.
//!
//! Submission returns an upstream job id; status comes from a sibling
//! `GET {endpoint}/{job_id}` and is normalized across the status spellings
//! backends use (`completed`/`SUCCESS`, `failed`/`FAILURE`).

use mgen_net::{ResilientClient, RetryPolicy};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{JobPoll, VideoGenerator};

/// Configuration for the video generation backend.
#[derive(Debug, Clone)]
pub struct VideoGenConfig {
    /// Generation endpoint URL; job status lives at `{endpoint}/{id}`
    pub endpoint: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Transport retry policy
    pub retry: RetryPolicy,
}

impl VideoGenConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryPolicy::generation(),
        }
    }
}

/// HTTP video generator.
pub struct HttpVideoGenerator {
    client: ResilientClient,
    config: VideoGenConfig,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(alias = "output_url")]
    video_url: Option<String>,
    error: Option<String>,
}

/// Map an upstream status string to a normalized poll outcome.
fn normalize_status(response: PollResponse, job_id: &str) -> ProviderResult<JobPoll> {
    match response.status.to_ascii_lowercase().as_str() {
        "pending" | "queued" => Ok(JobPoll::Pending),
        "processing" | "running" => Ok(JobPoll::Processing),
        "completed" | "success" => {
            let output_url = response.video_url.ok_or_else(|| {
                ProviderError::invalid_response(format!(
                    "job {job_id} completed without an output url"
                ))
            })?;
            Ok(JobPoll::Completed { output_url })
        }
        "failed" | "failure" => Ok(JobPoll::Failed {
            reason: response
                .error
                .unwrap_or_else(|| "no reason reported".to_string()),
        }),
        other => Err(ProviderError::invalid_response(format!(
            "unknown job status {other:?} for job {job_id}"
        ))),
    }
}

impl HttpVideoGenerator {
    pub fn new(config: VideoGenConfig) -> Self {
        Self {
            client: ResilientClient::new(),
            config,
        }
    }

    pub fn with_client(config: VideoGenConfig, client: ResilientClient) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl VideoGenerator for HttpVideoGenerator {
    async fn submit(
        &self,
        prompt: &str,
        conditioning_image_url: &str,
        aspect_ratio: Option<&str>,
    ) -> ProviderResult<String> {
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "image_url": conditioning_image_url,
        });
        if let Some(aspect) = aspect_ratio {
            body["aspect_ratio"] = json!(aspect);
        }

        debug!(model = %self.config.model, "submitting video generation job");

        let response = self
            .client
            .send_with_retry(&self.config.retry, "video_submit", |http| {
                http.post(&self.config.endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
            })
            .await?;

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("malformed body: {e}")))?;
        Ok(parsed.task_id)
    }

    async fn poll(&self, job_id: &str) -> ProviderResult<JobPoll> {
        let url = format!("{}/{}", self.config.endpoint.trim_end_matches('/'), job_id);

        let response = self
            .client
            .send_with_retry(&self.config.retry, "video_poll", |http| {
                http.get(&url).bearer_auth(&self.config.api_key)
            })
            .await?;

        let parsed: PollResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("malformed body: {e}")))?;
        normalize_status(parsed, job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn poll_response(status: &str, url: Option<&str>, error: Option<&str>) -> PollResponse {
        PollResponse {
            status: status.to_string(),
            video_url: url.map(String::from),
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(
            normalize_status(poll_response("pending", None, None), "j").unwrap(),
            JobPoll::Pending
        );
        assert_eq!(
            normalize_status(poll_response("processing", None, None), "j").unwrap(),
            JobPoll::Processing
        );
        assert_eq!(
            normalize_status(poll_response("SUCCESS", Some("https://v/x.mp4"), None), "j")
                .unwrap(),
            JobPoll::Completed {
                output_url: "https://v/x.mp4".into()
            }
        );
        assert_eq!(
            normalize_status(poll_response("FAILURE", None, Some("gpu oom")), "j").unwrap(),
            JobPoll::Failed {
                reason: "gpu oom".into()
            }
        );
    }

    #[test]
    fn test_completed_without_url_is_invalid() {
        let err = normalize_status(poll_response("completed", None, None), "j").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_unknown_status_is_invalid() {
        let err = normalize_status(poll_response("paused", None, None), "j").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_submit_and_poll_roundtrip() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "task_id": "vid-1" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/vid-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "output_url": "https://v.example.com/vid-1.mp4"
            })))
            .mount(&server)
            .await;

        let mut config = VideoGenConfig::new(
            format!("{}/v1/videos", server.uri()),
            "test-key",
            "motion-v2",
        );
        config.retry = RetryPolicy::generation()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5));

        let generator = HttpVideoGenerator::new(config);
        let job_id = generator
            .submit("opening segment", "https://cdn.example.com/frame.jpg", Some("9:16"))
            .await
            .unwrap();
        assert_eq!(job_id, "vid-1");

        let poll = generator.poll(&job_id).await.unwrap();
        assert_eq!(
            poll,
            JobPoll::Completed {
                output_url: "https://v.example.com/vid-1.mp4".into()
            }
        );
    }
}
