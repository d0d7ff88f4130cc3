//! Structured task logging utilities.

use mgen_models::TaskId;
use tracing::{error, info, warn};

/// Task logger with consistent structured fields.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    operation: String,
}

impl TaskLogger {
    /// Create a logger for a task and operation (e.g. "video_chain").
    pub fn new(task_id: &TaskId, operation: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task started: {}", message
        );
    }

    pub fn log_stage(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task stage: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task completed: {}", message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_carries_task_context() {
        let task_id = TaskId::from_string("task-123");
        let logger = TaskLogger::new(&task_id, "image_slideshow");
        assert_eq!(logger.task_id, "task-123");
        assert_eq!(logger.operation, "image_slideshow");
    }
}
