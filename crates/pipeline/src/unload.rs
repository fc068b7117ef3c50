//! Releases the backend's checkpoint after a stretch without work.
//!
//! A loaded checkpoint pins several GB of VRAM. When nothing has run for
//! the configured idle time the backend is asked to unload it, and the
//! execution context forgets it so the next task announces a model change.

use std::sync::Arc;
use std::time::Duration;

use navigator_forge::GenerationBackend;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;

/// Time between idle checks.
pub const UNLOAD_CHECK_PERIOD: Duration = Duration::from_secs(5 * 60);

/// What one idle check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadCheck {
    /// A task holds the backend.
    Busy,
    /// The last task settled less than the idle time ago.
    RecentlyUsed,
    /// No checkpoint is tracked as loaded.
    NothingLoaded,
    Unloaded,
    /// The backend refused; the model stays tracked and the next check
    /// tries again.
    Failed,
}

pub struct CheckpointUnloader {
    backend: Arc<dyn GenerationBackend>,
    context: Arc<ExecutionContext>,
    idle_after: Duration,
    period: Duration,
}

impl CheckpointUnloader {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        context: Arc<ExecutionContext>,
        idle_after: Duration,
    ) -> Self {
        Self {
            backend,
            context,
            idle_after,
            period: UNLOAD_CHECK_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Unload the checkpoint if the backend has been idle long enough.
    ///
    /// A process that has not run any task yet counts as idle.
    pub async fn check_once(&self) -> UnloadCheck {
        if let Some(active) = self.context.current().await {
            tracing::debug!(job_id = %active.job_id, "Task running, keeping checkpoint");
            return UnloadCheck::Busy;
        }

        if let Some(settled_at) = self.context.last_settled_at().await {
            let idle = settled_at.elapsed();
            if idle <= self.idle_after {
                tracing::debug!(idle_secs = idle.as_secs(), "Backend used recently, keeping checkpoint");
                return UnloadCheck::RecentlyUsed;
            }
        }

        let Some(model) = self.context.last_used_model().await else {
            return UnloadCheck::NothingLoaded;
        };

        match self.backend.unload_checkpoint().await {
            Ok(()) => {
                self.context.clear_last_used_model().await;
                tracing::info!(model = %model, "Unloaded idle checkpoint");
                UnloadCheck::Unloaded
            }
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "Failed to unload checkpoint");
                UnloadCheck::Failed
            }
        }
    }

    /// Check every period until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                idle_after_secs = self.idle_after.as_secs(),
                period_secs = self.period.as_secs(),
                "Checkpoint auto-unload enabled",
            );
            let mut ticker = tokio::time::interval(self.period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = self.check_once().await;
                        tracing::trace!(?outcome, "Checkpoint idle check");
                    }
                }
            }
        })
    }
}
