//! Task record definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::step::Progress;

/// Unique identifier for a generation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse task state visible to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task accepted, pipeline not started yet
    #[default]
    Pending,
    /// Pipeline is running
    Processing,
    /// Final artifact published
    Success,
    /// Pipeline failed; `result.error` carries the reason
    Failed,
    /// Task was canceled before completion
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
        }
    }

    /// Terminal states receive no further pipeline updates.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failed | TaskStatus::Canceled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which pipeline shape a provider uses.
///
/// Image providers generate N stills in parallel and mux them over a
/// narration track; video providers generate clips sequentially because
/// each clip is conditioned on the last frame of the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    ImageSlideshow,
    VideoChain,
}

/// Generation parameters supplied by the caller.
///
/// The pipeline reads the named fields; everything else is carried opaquely
/// in `extra` and passed through to providers untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Target description (e.g. muscle group or scene subject)
    pub target: String,

    /// Reference image URL; required by plans that condition on a user image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,

    /// Target aspect ratio (e.g. "9:16")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    /// Narration voice identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Difficulty hint forwarded to the analysis prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,

    /// Number of images to generate (image pipelines)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_count: Option<u32>,

    /// Opaque passthrough parameters
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Artifact URLs and analysis metadata produced by a finished pipeline.
///
/// URLs are only ever written after the corresponding file is fully on disk;
/// a failed task carries `error` and nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Un-watermarked originals, persisted before any compositing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub original_image_urls: Vec<String>,

    /// The upstream analysis payload, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// True when no artifact or error has been recorded.
    pub fn is_empty(&self) -> bool {
        self.video_url.is_none()
            && self.image_urls.is_empty()
            && self.audio_url.is_none()
            && self.original_image_urls.is_empty()
            && self.analysis.is_none()
            && self.error.is_none()
    }
}

/// A generation task record.
///
/// Created in `Pending` by the request handler, mutated exclusively by the
/// pipeline via atomic status+progress writes, never deleted by the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// Owning user
    pub user_id: String,

    /// Generation backend identifier
    pub provider: String,

    /// Backend model name
    pub model: String,

    /// Caller-supplied generation parameters
    pub options: GenerationOptions,

    /// Coarse state
    #[serde(default)]
    pub status: TaskStatus,

    /// Fine-grained progress blob
    pub progress: Progress,

    /// Produced artifacts
    #[serde(default)]
    pub result: TaskResult,

    /// Back-reference to the charge reversed if the task fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            user_id: user_id.into(),
            provider: provider.into(),
            model: model.into(),
            options,
            status: TaskStatus::Pending,
            progress: Progress::pending(now),
            result: TaskResult::default(),
            credit_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the credit charge backing this task.
    pub fn with_credit_id(mut self, credit_id: impl Into<String>) -> Self {
        self.credit_id = Some(credit_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new(
            "user-1",
            "lumen",
            "lumen-video-1",
            GenerationOptions {
                target: "chest".into(),
                reference_image_url: Some("https://example.com/ref.jpg".into()),
                ..Default::default()
            },
        );

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress.percent, 0);
        assert!(task.result.is_empty());
        assert!(task.credit_id.is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_options_roundtrip_preserves_extra() {
        let json = serde_json::json!({
            "target": "back",
            "voice": "nova",
            "custom_seed": 42
        });

        let opts: GenerationOptions = serde_json::from_value(json).unwrap();
        assert_eq!(opts.target, "back");
        assert_eq!(opts.voice.as_deref(), Some("nova"));
        assert_eq!(opts.extra.get("custom_seed"), Some(&serde_json::json!(42)));

        let back = serde_json::to_value(&opts).unwrap();
        assert_eq!(back.get("custom_seed"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_result_is_empty() {
        let mut result = TaskResult::default();
        assert!(result.is_empty());

        result.video_url = Some("https://cdn.example.com/final.mp4".into());
        assert!(!result.is_empty());
    }
}
