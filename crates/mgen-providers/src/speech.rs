//! Speech synthesis client.

use mgen_net::{ResilientClient, RetryPolicy};
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::SpeechSynthesizer;

/// Configuration for the text-to-speech backend.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// TTS endpoint URL
    pub endpoint: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Transport retry policy
    pub retry: RetryPolicy,
}

impl SpeechConfig {
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

/// HTTP speech synthesizer returning encoded audio bytes.
pub struct HttpSpeechSynthesizer {
    client: ResilientClient,
    config: SpeechConfig,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            client: ResilientClient::new(),
            config,
        }
    }

    pub fn with_client(config: SpeechConfig, client: ResilientClient) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(ProviderError::invalid_response("empty narration text"));
        }

        let body = json!({
            "model": self.config.model,
            "input": text,
            "voice": voice,
        });

        debug!(voice = %voice, chars = text.len(), "synthesizing narration");

        let response = self
            .client
            .send_with_retry(&self.config.retry, "speech_synthesis", |http| {
                http.post(&self.config.endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
            })
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("body read failed: {e}")))?;

        if bytes.is_empty() {
            return Err(ProviderError::invalid_response("empty audio payload"));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> SpeechConfig {
        let mut config = SpeechConfig::new(
            format!("{}/v1/speech", server.uri()),
            "test-key",
            "tts-hd",
        );
        config.retry = RetryPolicy::generation()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5));
        config
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()),
            )
            .mount(&server)
            .await;

        let synthesizer = HttpSpeechSynthesizer::new(config(&server));
        let bytes = synthesizer
            .synthesize("Lower yourself slowly.", "nova")
            .await
            .unwrap();

        assert_eq!(bytes, b"ID3audio");
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_request() {
        let server = MockServer::start().await;
        let synthesizer = HttpSpeechSynthesizer::new(config(&server));

        let err = synthesizer.synthesize("   ", "nova").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_audio_payload_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::new()))
            .mount(&server)
            .await;

        let synthesizer = HttpSpeechSynthesizer::new(config(&server));
        let err = synthesizer
            .synthesize("Some narration", "nova")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
