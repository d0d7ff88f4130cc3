//! Vision analysis client.
//!
//! Talks to a chat-completions style endpoint with a strict JSON-schema
//! response format. A response only counts when `finish_reason` is
//! `"stop"` and the body parses against the declared schema; anything
//! else is a semantic failure surfaced without retry.

use mgen_net::{ResilientClient, RetryPolicy};
use mgen_models::{ObjectRecognition, SceneScript};
use schemars::{gen::SchemaGenerator, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::VisionAnalyzer;

/// The only finish reason accepted as a complete answer.
const FINISH_STOP: &str = "stop";

/// Configuration for the vision analysis backend.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Chat-completions endpoint URL
    pub endpoint: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Transport retry policy
    pub retry: RetryPolicy,
}

impl VisionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryPolicy::http(),
        }
    }
}

/// HTTP vision analyzer.
pub struct HttpVisionAnalyzer {
    client: ResilientClient,
    config: VisionConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpVisionAnalyzer {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            client: ResilientClient::new(),
            config,
        }
    }

    /// Use a shared HTTP client (connection pool reuse).
    pub fn with_client(config: VisionConfig, client: ResilientClient) -> Self {
        Self { client, config }
    }

    /// Call the endpoint and parse the structured answer as `T`.
    async fn call_structured<T>(
        &self,
        schema_name: &str,
        system_prompt: &str,
        user_prompt: &str,
        image_url: &str,
    ) -> ProviderResult<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = SchemaGenerator::default().into_root_schema_for::<T>();
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": user_prompt },
                        { "type": "image_url", "image_url": { "url": image_url } }
                    ]
                }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema
                }
            }
        });

        debug!(model = %self.config.model, schema = %schema_name, "calling vision endpoint");

        let response = self
            .client
            .send_with_retry(&self.config.retry, "vision_analysis", |http| {
                http.post(&self.config.endpoint)
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
            })
            .await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("malformed envelope: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response("no choices in response"))?;

        // A truncated or filtered answer is a semantic failure, not a
        // transport one; do not retry.
        match choice.finish_reason.as_deref() {
            Some(FINISH_STOP) => {}
            other => {
                return Err(ProviderError::AnalysisRejected(format!(
                    "finish_reason was {:?}, expected \"stop\"",
                    other
                )))
            }
        }

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::AnalysisRejected("empty message content".into()))?;

        serde_json::from_str::<T>(&content).map_err(|e| {
            ProviderError::AnalysisRejected(format!("response does not match schema: {e}"))
        })
    }
}

#[async_trait::async_trait]
impl VisionAnalyzer for HttpVisionAnalyzer {
    async fn analyze_scene(
        &self,
        image_url: &str,
        target: &str,
        difficulty: Option<&str>,
    ) -> ProviderResult<SceneScript> {
        let difficulty_line = difficulty
            .map(|d| format!(" Difficulty: {d}."))
            .unwrap_or_default();
        let user_prompt = format!(
            "Create a short demonstration script for \"{target}\" based on the person \
             in this photo.{difficulty_line} Return 1 to 3 ordered segments; each \
             segment needs a generation prompt and a narration line."
        );

        let script: SceneScript = self
            .call_structured(
                "scene_script",
                "You write concise, physically accurate demonstration scripts.",
                &user_prompt,
                image_url,
            )
            .await?;

        script
            .validate()
            .map_err(|e| ProviderError::AnalysisRejected(e.to_string()))?;

        info!(
            segments = script.segments.len(),
            "vision analysis produced a scene script"
        );
        Ok(script)
    }

    async fn recognize_object(
        &self,
        image_url: &str,
        target: &str,
    ) -> ProviderResult<ObjectRecognition> {
        let user_prompt = format!(
            "Identify the object in this photo that best matches \"{target}\" and \
             return its matching metadata."
        );

        self.call_structured(
            "object_recognition",
            "You identify objects in user photos.",
            &user_prompt,
            image_url,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> VisionConfig {
        let mut config = VisionConfig::new(
            format!("{}/v1/chat/completions", server.uri()),
            "test-key",
            "vision-large",
        );
        config.retry = RetryPolicy::http()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1));
        config
    }

    fn chat_body(finish_reason: &str, content: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": finish_reason
            }]
        })
    }

    #[tokio::test]
    async fn test_valid_script_is_parsed() {
        let server = MockServer::start().await;
        let script = json!({
            "title": "Incline push-up",
            "segments": [
                { "prompt": "starting position", "narration": "Start here." },
                { "prompt": "lowering phase", "narration": "Lower slowly." }
            ]
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("stop", &script.to_string())),
            )
            .mount(&server)
            .await;

        let analyzer = HttpVisionAnalyzer::new(config(&server));
        let result = analyzer
            .analyze_scene("https://cdn.example.com/ref.jpg", "chest", Some("beginner"))
            .await
            .unwrap();

        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.title.as_deref(), Some("Incline push-up"));
    }

    #[tokio::test]
    async fn test_non_stop_finish_reason_fails_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body("length", "{}")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let analyzer = HttpVisionAnalyzer::new(config(&server));
        let err = analyzer
            .analyze_scene("https://cdn.example.com/ref.jpg", "chest", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::AnalysisRejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_json_content_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("stop", "not json at all")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let analyzer = HttpVisionAnalyzer::new(config(&server));
        let err = analyzer
            .recognize_object("https://cdn.example.com/ref.jpg", "dumbbell")
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::AnalysisRejected(_)));
    }

    #[tokio::test]
    async fn test_empty_script_is_rejected() {
        let server = MockServer::start().await;
        let script = json!({ "segments": [] });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("stop", &script.to_string())),
            )
            .mount(&server)
            .await;

        let analyzer = HttpVisionAnalyzer::new(config(&server));
        let err = analyzer
            .analyze_scene("https://cdn.example.com/ref.jpg", "chest", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::AnalysisRejected(_)));
    }
}
