//! Provider capability traits.

use async_trait::async_trait;
use mgen_models::{ObjectRecognition, SceneScript};

use crate::error::ProviderResult;

/// Outcome of polling a video generation job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// Accepted, not started
    Pending,
    /// Still rendering
    Processing,
    /// Finished; `output_url` points at the produced clip
    Completed { output_url: String },
    /// Terminal failure
    Failed { reason: String },
}

impl JobPoll {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPoll::Completed { .. } | JobPoll::Failed { .. })
    }
}

/// Vision analysis of a reference image.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Produce a scripted scene (1–3 segments) for `target`.
    async fn analyze_scene(
        &self,
        image_url: &str,
        target: &str,
        difficulty: Option<&str>,
    ) -> ProviderResult<SceneScript>;

    /// Identify the object in the image matching `target`.
    async fn recognize_object(
        &self,
        image_url: &str,
        target: &str,
    ) -> ProviderResult<ObjectRecognition>;
}

/// Prompt-to-image generation.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image, optionally conditioned on a reference image.
    /// Returns the result URL.
    async fn generate(
        &self,
        prompt: &str,
        reference_image_url: Option<&str>,
        aspect_ratio: Option<&str>,
    ) -> ProviderResult<String>;
}

/// Asynchronous clip generation with job polling.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Submit a clip job conditioned on `conditioning_image_url`.
    /// Returns the upstream job id.
    async fn submit(
        &self,
        prompt: &str,
        conditioning_image_url: &str,
        aspect_ratio: Option<&str>,
    ) -> ProviderResult<String>;

    /// Poll a job by id.
    async fn poll(&self, job_id: &str) -> ProviderResult<JobPoll>;
}

/// Narration synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice`, returning encoded audio bytes.
    async fn synthesize(&self, text: &str, voice: &str) -> ProviderResult<Vec<u8>>;
}
