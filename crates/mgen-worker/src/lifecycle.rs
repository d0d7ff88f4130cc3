//! Task lifecycle supervision.
//!
//! `schedule` validates the request, guarantees at most one in-flight
//! execution per task id, and launches the pipeline detached from the
//! caller. The supervisor always drives the task record to a terminal
//! state: Success is written by the pipeline itself; every other exit
//! (error or panic) is converted into a Failed write with refund
//! bookkeeping. Tasks orphaned in Processing by a process crash are not
//! auto-resumed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use mgen_models::{Task, TaskId};
use tracing::{error, info};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{persist_failure, GenerationPipeline, PipelineContext};
use crate::plan::PipelinePlan;
use crate::promote::promote_workdir;

/// Removes a task id from the in-flight set when the execution ends,
/// whatever way it ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().expect("lock poisoned").remove(&self.id);
    }
}

/// Schedules pipeline runs and supervises their completion.
pub struct TaskLifecycleController {
    ctx: Arc<PipelineContext>,
    plans: HashMap<String, PipelinePlan>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TaskLifecycleController {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            plans: HashMap::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Register a provider variant.
    pub fn register_plan(mut self, plan: PipelinePlan) -> Self {
        self.plans.insert(plan.provider.clone(), plan);
        self
    }

    /// Whether a pipeline run is currently active for `id`.
    pub fn is_running(&self, id: &TaskId) -> bool {
        self.in_flight
            .lock()
            .expect("lock poisoned")
            .contains(id.as_str())
    }

    /// Validate and schedule `task`, returning immediately with its id.
    ///
    /// The pipeline runs detached; the caller polls for status. Errors
    /// returned here are the synchronous validation tier: unknown
    /// provider, missing required inputs, or an execution already in
    /// flight for this id.
    pub async fn schedule(&self, task: Task) -> WorkerResult<TaskId> {
        let plan = self
            .plans
            .get(&task.provider)
            .cloned()
            .ok_or_else(|| {
                WorkerError::validation(format!("unknown provider: {}", task.provider))
            })?;

        if plan.requires_reference_image
            && task
                .options
                .reference_image_url
                .as_deref()
                .map_or(true, |u| u.trim().is_empty())
        {
            return Err(WorkerError::validation(
                "reference image is required for this provider",
            ));
        }

        // At most one execution per task id. The guard is created before
        // spawning so a second schedule for the same id fails fast.
        let guard = {
            let mut in_flight = self.in_flight.lock().expect("lock poisoned");
            if !in_flight.insert(task.id.as_str().to_string()) {
                return Err(WorkerError::AlreadyRunning(task.id.to_string()));
            }
            InFlightGuard {
                set: Arc::clone(&self.in_flight),
                id: task.id.as_str().to_string(),
            }
        };

        // Ensure the record exists before acknowledging.
        if self.ctx.repo.find(&task.id).await?.is_none() {
            self.ctx.repo.create(&task).await?;
        }

        let task_id = task.id.clone();
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(Self::supervise(ctx, plan, task_id.clone(), guard));

        info!(task_id = %task_id, "task scheduled");
        Ok(task_id)
    }

    /// Run one pipeline detached, guaranteeing a terminal state.
    async fn supervise(
        ctx: Arc<PipelineContext>,
        plan: PipelinePlan,
        task_id: TaskId,
        guard: InFlightGuard,
    ) {
        let _guard = guard;
        let pipeline = GenerationPipeline::new(plan, Arc::clone(&ctx));

        let outcome = std::panic::AssertUnwindSafe(pipeline.run(&task_id))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(_result)) => {
                if ctx.config.promote_to_durable {
                    let ctx = Arc::clone(&ctx);
                    let task_id = task_id.clone();
                    tokio::spawn(async move {
                        promote_workdir(&ctx, &task_id).await;
                    });
                }
            }
            Ok(Err(e)) => {
                error!(task_id = %task_id, "pipeline failed: {e}");
                persist_failure(&ctx, &task_id, &e.to_string()).await;
            }
            Err(_panic) => {
                error!(task_id = %task_id, "pipeline panicked");
                persist_failure(&ctx, &task_id, "internal error: pipeline panicked").await;
            }
        }
    }
}
