//! Poll-based status queries.

use std::sync::Arc;

use mgen_models::{Progress, TaskId, TaskResult, TaskStatus};
use mgen_tasks::TaskRepository;
use serde::Serialize;

use crate::error::{WorkerError, WorkerResult};

/// Normalized status envelope returned to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEnvelope {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: Progress,
    pub result: TaskResult,
}

/// Read-only reshape of task records for polling clients.
///
/// Performs no side effects and no network calls; an unknown id is an
/// error, never an empty default.
pub struct StatusQueryService {
    repo: Arc<dyn TaskRepository>,
}

impl StatusQueryService {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    pub async fn query(&self, task_id: &TaskId) -> WorkerResult<StatusEnvelope> {
        let task = self
            .repo
            .find(task_id)
            .await?
            .ok_or_else(|| WorkerError::TaskNotFound(task_id.to_string()))?;

        Ok(StatusEnvelope {
            task_id: task.id.to_string(),
            status: task.status,
            progress: task.progress,
            result: task.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgen_models::{GenerationOptions, Task};
    use mgen_tasks::MemoryTaskRepository;

    #[tokio::test]
    async fn test_query_reshapes_record() {
        let repo = Arc::new(MemoryTaskRepository::new());
        let task = Task::new("user-1", "lumen", "lumen-video-1", GenerationOptions::default());
        repo.create(&task).await.unwrap();

        let service = StatusQueryService::new(repo);
        let envelope = service.query(&task.id).await.unwrap();

        assert_eq!(envelope.task_id, task.id.to_string());
        assert_eq!(envelope.status, TaskStatus::Pending);
        assert_eq!(envelope.progress.percent, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let repo = Arc::new(MemoryTaskRepository::new());
        let service = StatusQueryService::new(repo);

        let err = service
            .query(&TaskId::from_string("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::TaskNotFound(_)));
    }
}
