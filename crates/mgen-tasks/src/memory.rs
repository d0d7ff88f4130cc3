//! In-memory task repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use mgen_models::{Progress, Task, TaskId, TaskResult, TaskStatus};

use crate::error::{TaskStoreError, TaskStoreResult};
use crate::repository::{ResultUrlPatch, TaskRepository};

/// HashMap-backed repository for tests and local runs.
///
/// Records every persisted progress write per task so callers can assert
/// on the exact sequence a polling client would have observed.
#[derive(Debug, Default)]
pub struct MemoryTaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
    progress_log: Mutex<HashMap<String, Vec<Progress>>>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sequence of progress writes persisted for a task.
    pub fn progress_history(&self, id: &TaskId) -> Vec<Progress> {
        self.progress_log
            .lock()
            .expect("lock poisoned")
            .get(id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a task entirely (simulates repository-side retention).
    pub fn remove(&self, id: &TaskId) {
        self.tasks.lock().expect("lock poisoned").remove(id.as_str());
    }

    fn log_progress(&self, id: &TaskId, progress: &Progress) {
        self.progress_log
            .lock()
            .expect("lock poisoned")
            .entry(id.as_str().to_string())
            .or_default()
            .push(progress.clone());
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, task: &Task) -> TaskStoreResult<()> {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        if tasks.contains_key(task.id.as_str()) {
            return Err(TaskStoreError::AlreadyExists(task.id.to_string()));
        }
        tasks.insert(task.id.as_str().to_string(), task.clone());
        Ok(())
    }

    async fn find(&self, id: &TaskId) -> TaskStoreResult<Option<Task>> {
        Ok(self
            .tasks
            .lock()
            .expect("lock poisoned")
            .get(id.as_str())
            .cloned())
    }

    async fn set_progress(
        &self,
        id: &TaskId,
        status: TaskStatus,
        progress: &Progress,
    ) -> TaskStoreResult<()> {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        let task = tasks
            .get_mut(id.as_str())
            .ok_or_else(|| TaskStoreError::not_found(id.as_str()))?;

        task.status = status;
        task.progress = progress.clone();
        task.updated_at = Utc::now();
        drop(tasks);

        self.log_progress(id, progress);
        Ok(())
    }

    async fn set_outcome(
        &self,
        id: &TaskId,
        status: TaskStatus,
        progress: &Progress,
        result: &TaskResult,
    ) -> TaskStoreResult<()> {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        let task = tasks
            .get_mut(id.as_str())
            .ok_or_else(|| TaskStoreError::not_found(id.as_str()))?;

        task.status = status;
        task.progress = progress.clone();
        task.result = result.clone();
        task.updated_at = Utc::now();
        drop(tasks);

        self.log_progress(id, progress);
        Ok(())
    }

    async fn patch_result_urls(
        &self,
        id: &TaskId,
        patch: &ResultUrlPatch,
    ) -> TaskStoreResult<()> {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        let task = tasks
            .get_mut(id.as_str())
            .ok_or_else(|| TaskStoreError::not_found(id.as_str()))?;

        if let Some(url) = &patch.video_url {
            task.result.video_url = Some(url.clone());
        }
        if let Some(urls) = &patch.image_urls {
            task.result.image_urls = urls.clone();
        }
        if let Some(url) = &patch.audio_url {
            task.result.audio_url = Some(url.clone());
        }
        if let Some(urls) = &patch.original_image_urls {
            task.result.original_image_urls = urls.clone();
        }
        task.updated_at = Utc::now();
        Ok(())
    }
}
