//! Task repository port.

use async_trait::async_trait;
use mgen_models::{Progress, Task, TaskId, TaskResult, TaskStatus};

use crate::error::TaskStoreResult;

/// URL-only patch applied by the durable-storage promote pass.
///
/// Deliberately excludes status, progress, and error so the promote pass
/// can run concurrently with (or after) the pipeline's own writes without
/// contending on anything but the URL fields.
#[derive(Debug, Clone, Default)]
pub struct ResultUrlPatch {
    pub video_url: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub audio_url: Option<String>,
    pub original_image_urls: Option<Vec<String>>,
}

impl ResultUrlPatch {
    pub fn is_empty(&self) -> bool {
        self.video_url.is_none()
            && self.image_urls.is_none()
            && self.audio_url.is_none()
            && self.original_image_urls.is_none()
    }
}

/// Persistence port for task records.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task record.
    async fn create(&self, task: &Task) -> TaskStoreResult<()>;

    /// Fetch a task by id; `None` when unknown.
    async fn find(&self, id: &TaskId) -> TaskStoreResult<Option<Task>>;

    /// Atomically set coarse status and the progress blob.
    async fn set_progress(
        &self,
        id: &TaskId,
        status: TaskStatus,
        progress: &Progress,
    ) -> TaskStoreResult<()>;

    /// Atomically set the terminal outcome: status, progress, and result.
    async fn set_outcome(
        &self,
        id: &TaskId,
        status: TaskStatus,
        progress: &Progress,
        result: &TaskResult,
    ) -> TaskStoreResult<()>;

    /// Patch only result URL fields (promote pass).
    async fn patch_result_urls(
        &self,
        id: &TaskId,
        patch: &ResultUrlPatch,
    ) -> TaskStoreResult<()>;
}
