//! Image generation client.

use mgen_net::{ResilientClient, RetryPolicy};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::ImageGenerator;

/// Configuration for the image generation backend.
#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    /// Images endpoint URL
    pub endpoint: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Transport retry policy (generation calls run long)
    pub retry: RetryPolicy,
}

impl ImageGenConfig {
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

/// HTTP image generator.
pub struct HttpImageGenerator {
    client: ResilientClient,
    config: ImageGenConfig,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

impl HttpImageGenerator {
    pub fn new(config: ImageGenConfig) -> Self {
        Self {
            client: ResilientClient::new(),
            config,
        }
    }

    pub fn with_client(config: ImageGenConfig, client: ResilientClient) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(
        &self,
        prompt: &str,
        reference_image_url: Option<&str>,
        aspect_ratio: Option<&str>,
    ) -> ProviderResult<String> {
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "n": 1,
        });
        if let Some(reference) = reference_image_url {
            body["image_url"] = json!(reference);
        }
        if let Some(aspect) = aspect_ratio {
            body["aspect_ratio"] = json!(aspect);
        }

        debug!(model = %self.config.model, "requesting image generation");

        let response = self
            .client
            .send_with_retry(&self.config.retry, "image_generation", |http| {
                http.post(&self.config.endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
            })
            .await?;

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("malformed body: {e}")))?;

        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| ProviderError::invalid_response("no image url in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ImageGenConfig {
        let mut config = ImageGenConfig::new(
            format!("{}/v1/images", server.uri()),
            "test-key",
            "image-xl",
        );
        config.retry = RetryPolicy::generation()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5));
        config
    }

    #[tokio::test]
    async fn test_generate_returns_first_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images"))
            .and(body_partial_json(json!({ "prompt": "a kettlebell swing" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "url": "https://img.example.com/a.png" }]
            })))
            .mount(&server)
            .await;

        let generator = HttpImageGenerator::new(config(&server));
        let url = generator
            .generate("a kettlebell swing", Some("https://cdn.example.com/ref.jpg"), None)
            .await
            .unwrap();

        assert_eq!(url, "https://img.example.com/a.png");
    }

    #[tokio::test]
    async fn test_empty_data_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let generator = HttpImageGenerator::new(config(&server));
        let err = generator.generate("prompt", None, None).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
