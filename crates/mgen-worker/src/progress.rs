//! Step progress tracking.

use std::sync::Arc;

use mgen_models::{Progress, Step, TaskId, TaskStatus};
use mgen_tasks::TaskRepository;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::WorkerResult;

/// Tracks a task's step progression and flushes every advance to the
/// repository as one atomic status+progress write.
///
/// Percent is monotonic for the task's lifetime (the underlying `Progress`
/// clamps regressions) and re-advancing to the current step only refreshes
/// `updated_at`.
pub struct ProgressTracker {
    task_id: TaskId,
    repo: Arc<dyn TaskRepository>,
    progress: Mutex<Progress>,
}

impl ProgressTracker {
    /// Resume tracking from a task's persisted progress.
    pub fn new(task_id: TaskId, repo: Arc<dyn TaskRepository>, progress: Progress) -> Self {
        Self {
            task_id,
            repo,
            progress: Mutex::new(progress),
        }
    }

    /// Advance to `step` with its default message.
    pub async fn advance(&self, step: Step) -> WorkerResult<()> {
        self.advance_with_message(step, step.default_message()).await
    }

    /// Advance to `step` with an explicit message.
    pub async fn advance_with_message(
        &self,
        step: Step,
        message: impl Into<String>,
    ) -> WorkerResult<()> {
        let mut progress = self.progress.lock().await;
        progress.advance(step, message);

        let status = if step == Step::Completed {
            TaskStatus::Success
        } else {
            TaskStatus::Processing
        };

        debug!(
            task_id = %self.task_id,
            percent = progress.percent,
            "progress: {}", progress.message
        );

        self.repo
            .set_progress(&self.task_id, status, &progress)
            .await?;
        Ok(())
    }

    /// Current progress snapshot.
    pub async fn snapshot(&self) -> Progress {
        self.progress.lock().await.clone()
    }
}
