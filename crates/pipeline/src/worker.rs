//! The single consumer of the task queue.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use navigator_core::task::{Task, TaskStatus};
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;
use crate::executor::TaskExecutor;
use crate::gate::AdmissionGate;
use crate::queue::TaskQueue;

/// Pause between checks of an empty queue.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(100);

pub struct WorkerLoop {
    gate: AdmissionGate,
    queue: Arc<TaskQueue>,
    context: Arc<ExecutionContext>,
    executor: Arc<TaskExecutor>,
    idle_delay: Duration,
}

impl WorkerLoop {
    pub fn new(
        gate: AdmissionGate,
        queue: Arc<TaskQueue>,
        context: Arc<ExecutionContext>,
        executor: Arc<TaskExecutor>,
        idle_delay: Duration,
    ) -> Self {
        Self {
            gate,
            queue,
            context,
            executor,
            idle_delay,
        }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// A task that is executing when shutdown is requested runs to
    /// completion first.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(idle_delay_ms = self.idle_delay.as_millis() as u64, "Queue worker started");

        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = self.gate.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::warn!(error = %e, "Queue worker lost its admission gate");
                        break;
                    }
                },
            };

            match self.queue.try_pop().await {
                Some(task) => self.process(task).await,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.idle_delay) => {}
                    }
                }
            }

            drop(permit);
        }

        tracing::info!("Queue worker shutting down");
    }

    async fn process(&self, mut task: Task) {
        task.queue_size = None;
        task.status = TaskStatus::Started;
        self.context.set_current(&task).await;

        let outcome = AssertUnwindSafe(self.executor.execute(&mut task))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(job_id = %task.job_id, status = ?task.status, "Task settled");
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %task.job_id, error = %e, "Error processing task");
            }
            Err(_) => {
                tracing::error!(job_id = %task.job_id, "Task execution panicked");
                self.executor.report_failure(&mut task, "Internal error while processing task");
            }
        }

        self.context.clear_current().await;
    }
}
