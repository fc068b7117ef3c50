//! Producer-facing facade over the queue and the running task.

use std::sync::Arc;

use navigator_core::error::CoreError;
use navigator_core::job_events::EVENT_TASK_INTERRUPTED;
use navigator_core::store::ImageStore;
use navigator_core::task::{Task, TaskStatus, TaskSummary};
use navigator_events::NotificationSink;
use navigator_forge::{ForgeApiError, GenerationBackend};

use crate::context::{ActiveTask, ClaimOutcome, ExecutionContext};
use crate::queue::{RemoveOutcome, TaskQueue};

/// What [`JobScheduler::interrupt`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// The running task was interrupted on the backend.
    Interrupted,
    /// The task was still queued and has been dropped.
    Removed,
}

#[derive(Debug, thiserror::Error)]
pub enum InterruptError {
    #[error("Task not found")]
    NotFound,

    #[error("You are not the owner of this task")]
    Unauthorized,

    #[error("Failed to interrupt task on backend: {0}")]
    Backend(#[from] ForgeApiError),

    #[error("Failed to delete task record: {0}")]
    Storage(#[from] CoreError),
}

pub struct JobScheduler {
    queue: Arc<TaskQueue>,
    context: Arc<ExecutionContext>,
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn ImageStore>,
    sink: Arc<dyn NotificationSink>,
}

impl JobScheduler {
    pub fn new(
        queue: Arc<TaskQueue>,
        context: Arc<ExecutionContext>,
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn ImageStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            queue,
            context,
            backend,
            store,
            sink,
        }
    }

    /// Queue a task and return its public view, including its position.
    pub async fn enqueue(&self, task: Task) -> TaskSummary {
        let mut summary = task.summary();
        let job_id = task.job_id.clone();
        let position = self.queue.push(task).await;
        summary.queue_size = Some(position);
        tracing::info!(job_id = %job_id, position, "Task queued");
        summary
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.size().await
    }

    pub async fn contains(&self, job_id: &str) -> bool {
        self.queue.contains_id(job_id).await
    }

    /// The task holding the admission permit, if any.
    pub async fn current(&self) -> Option<ActiveTask> {
        self.context.current().await
    }

    /// Stop `job_id` on behalf of `requester`.
    ///
    /// A running task is interrupted on the backend; a queued one is
    /// removed and its storage row deleted. Either way only the owner may
    /// do it. A task whose result is already being reported counts as
    /// gone, and a refused backend interrupt leaves the task untouched.
    pub async fn interrupt(
        &self,
        job_id: &str,
        requester: &str,
    ) -> Result<InterruptOutcome, InterruptError> {
        match self.context.try_claim_interrupt(job_id, requester).await {
            ClaimOutcome::Claimed(active) => {
                let answer = self.backend.interrupt().await;
                let resolved = self.context.resolve_interrupt(job_id, answer.is_ok()).await;
                if let Err(e) = answer {
                    tracing::error!(job_id, error = %e, "Backend refused interrupt");
                    return Err(e.into());
                }
                if !resolved {
                    // Execution ended abnormally and already reported it.
                    tracing::warn!(job_id, "Task ended before the interrupt was confirmed");
                    return Err(InterruptError::NotFound);
                }
                let mut summary = active.summary;
                summary.status = TaskStatus::Interrupted;
                self.sink
                    .notify(&active.origin, EVENT_TASK_INTERRUPTED, summary.payload());
                tracing::info!(job_id, "Task interrupted");
                return Ok(InterruptOutcome::Interrupted);
            }
            ClaimOutcome::NotOwner => return Err(InterruptError::Unauthorized),
            ClaimOutcome::NotCurrent => {}
        }

        match self.queue.remove_owned(job_id, requester).await {
            RemoveOutcome::Removed(_) => {
                self.store.delete_image_record(job_id).await?;
                tracing::info!(job_id, "Queued task removed");
                Ok(InterruptOutcome::Removed)
            }
            RemoveOutcome::NotOwner => Err(InterruptError::Unauthorized),
            RemoveOutcome::Missing => Err(InterruptError::NotFound),
        }
    }
}
