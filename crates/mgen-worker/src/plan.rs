//! Per-provider pipeline plans.
//!
//! The four provider variants share one pipeline implementation; what
//! differs between them — pipeline shape, retry caps, polling cadence,
//! default voice — lives here as plain configuration.

use std::time::Duration;

use mgen_models::PipelineKind;

/// Configuration for one provider variant.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    /// Provider identifier recorded on tasks
    pub provider: String,
    /// Backend model name
    pub model: String,
    /// Pipeline shape
    pub kind: PipelineKind,
    /// Whether a reference image must be supplied
    pub requires_reference_image: bool,
    /// Interval between generation-job polls
    pub poll_interval: Duration,
    /// Wall-clock cap for one generation attempt
    pub max_generation_wait: Duration,
    /// Consecutive poll failures tolerated before the attempt is abandoned
    pub max_poll_failures: u32,
    /// Whole-segment generation attempts (video chains)
    pub segment_attempts: u32,
    /// Per-image generation attempts (image slideshows)
    pub image_attempts: u32,
    /// Base delay between stage-level retries (linear)
    pub stage_retry_delay: Duration,
    /// Narration voice used when the caller does not pick one
    pub default_voice: String,
}

impl PipelinePlan {
    /// Plan for a sequential clip-chaining video provider.
    pub fn video_chain(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            kind: PipelineKind::VideoChain,
            requires_reference_image: true,
            poll_interval: Duration::from_secs(20),
            max_generation_wait: Duration::from_secs(600),
            max_poll_failures: 3,
            segment_attempts: 2,
            image_attempts: 3,
            stage_retry_delay: Duration::from_secs(2),
            default_voice: "nova".to_string(),
        }
    }

    /// Plan for a parallel image-slideshow provider.
    pub fn image_slideshow(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind: PipelineKind::ImageSlideshow,
            ..Self::video_chain(provider, model)
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_generation_wait(mut self, wait: Duration) -> Self {
        self.max_generation_wait = wait;
        self
    }

    pub fn with_segment_attempts(mut self, attempts: u32) -> Self {
        self.segment_attempts = attempts.max(1);
        self
    }

    pub fn with_image_attempts(mut self, attempts: u32) -> Self {
        self.image_attempts = attempts.max(1);
        self
    }

    pub fn with_stage_retry_delay(mut self, delay: Duration) -> Self {
        self.stage_retry_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let plan = PipelinePlan::video_chain("lumen", "lumen-video-1");
        assert_eq!(plan.kind, PipelineKind::VideoChain);
        assert_eq!(plan.poll_interval, Duration::from_secs(20));
        assert_eq!(plan.max_generation_wait, Duration::from_secs(600));
        assert!(plan.requires_reference_image);
    }

    #[test]
    fn test_attempt_caps_never_zero() {
        let plan = PipelinePlan::image_slideshow("prisma", "prisma-xl").with_image_attempts(0);
        assert_eq!(plan.image_attempts, 1);
    }
}
