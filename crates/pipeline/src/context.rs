//! State shared between the worker and the scheduler.
//!
//! Tracks the checkpoint the backend last loaded, the task currently
//! holding the admission permit and when the last task settled.
//!
//! The executor and an interrupt both want to decide how the running task
//! ends. [`ActivePhase`] arbitrates: an interrupt first claims the task
//! (`Running -> Interrupting`), then resolves the claim once the backend
//! has answered. The executor settles (`Running -> Settled`) as soon as the
//! generation call returns, waiting out an interrupt still in flight. Only
//! one side ever reports a terminal event.

use navigator_core::task::{Task, TaskSummary};
use navigator_forge::GenerationBackend;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

/// Where the active task stands between dispatch and its terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePhase {
    Running,
    /// An interrupt was sent to the backend and has not been answered.
    Interrupting,
    /// The backend accepted the interrupt. The result is discarded.
    Interrupted,
    /// The executor owns the outcome. Interrupts no longer apply.
    Settled,
}

/// The task currently executing, as seen from outside the worker.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub job_id: String,
    pub owner_id: String,
    pub origin: String,
    pub summary: TaskSummary,
    pub phase: ActivePhase,
}

/// Result of [`ExecutionContext::try_claim_interrupt`].
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(ActiveTask),
    NotOwner,
    /// No interruptible task with that id is running.
    NotCurrent,
}

/// How the executor must treat its generation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Report the result as usual.
    Report,
    /// The task was interrupted; report nothing.
    Interrupted,
}

#[derive(Default)]
pub struct ExecutionContext {
    last_used_model: RwLock<Option<String>>,
    current: RwLock<Option<ActiveTask>>,
    last_settled_at: RwLock<Option<Instant>>,
    phase_changed: Notify,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- model tracking ----

    pub async fn last_used_model(&self) -> Option<String> {
        self.last_used_model.read().await.clone()
    }

    /// Record `model` as the backend's loaded checkpoint. Returns `true`
    /// if it differs from the previous one.
    pub async fn swap_model(&self, model: &str) -> bool {
        let mut last = self.last_used_model.write().await;
        let changed = last.as_deref() != Some(model);
        *last = Some(model.to_string());
        changed
    }

    /// Forget the loaded checkpoint after the backend unloaded it. The next
    /// task then reports a model change.
    pub async fn clear_last_used_model(&self) {
        *self.last_used_model.write().await = None;
    }

    /// Seed the model tracker from the backend's current options.
    ///
    /// Failure is logged; the tracker then starts empty and the first task
    /// reports a model change.
    pub async fn sync_model_from_backend(&self, backend: &dyn GenerationBackend) {
        match backend.options().await {
            Ok(options) => {
                if let Some(model) = options.sd_model_checkpoint {
                    tracing::info!(model = %model, "Loaded last used model from backend");
                    *self.last_used_model.write().await = Some(model);
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to read current checkpoint from backend, continuing without it",
                );
            }
        }
    }

    // ---- current task ----

    pub async fn current(&self) -> Option<ActiveTask> {
        self.current.read().await.clone()
    }

    pub async fn set_current(&self, task: &Task) {
        *self.current.write().await = Some(ActiveTask {
            job_id: task.job_id.clone(),
            owner_id: task.owner_id.clone(),
            origin: task.origin.clone(),
            summary: task.summary(),
            phase: ActivePhase::Running,
        });
    }

    /// Drop the current task and stamp the time it left the backend.
    pub async fn clear_current(&self) {
        *self.current.write().await = None;
        *self.last_settled_at.write().await = Some(Instant::now());
        self.phase_changed.notify_waiters();
    }

    /// When the last task left the backend. `None` until one has run.
    pub async fn last_settled_at(&self) -> Option<Instant> {
        *self.last_settled_at.read().await
    }

    // ---- interrupts ----

    /// Claim the running task `job_id` for an interrupt on behalf of
    /// `requester`. Only a `Running` task can be claimed.
    pub async fn try_claim_interrupt(&self, job_id: &str, requester: &str) -> ClaimOutcome {
        let mut current = self.current.write().await;
        match current.as_mut() {
            Some(active) if active.job_id == job_id && active.phase == ActivePhase::Running => {
                if active.owner_id != requester {
                    return ClaimOutcome::NotOwner;
                }
                active.phase = ActivePhase::Interrupting;
                ClaimOutcome::Claimed(active.clone())
            }
            _ => ClaimOutcome::NotCurrent,
        }
    }

    /// Finish a claim once the backend answered. A refused interrupt hands
    /// the task back to the executor untouched.
    ///
    /// Returns `false` if the claim no longer exists, which only happens
    /// when execution ended abnormally in the meantime.
    pub async fn resolve_interrupt(&self, job_id: &str, accepted: bool) -> bool {
        let resolved = {
            let mut current = self.current.write().await;
            match current.as_mut() {
                Some(active)
                    if active.job_id == job_id && active.phase == ActivePhase::Interrupting =>
                {
                    active.phase = if accepted {
                        ActivePhase::Interrupted
                    } else {
                        ActivePhase::Running
                    };
                    true
                }
                _ => false,
            }
        };
        self.phase_changed.notify_waiters();
        resolved
    }

    /// Decide the fate of `job_id` once its generation call has returned.
    ///
    /// Waits while an interrupt is in flight. After this returns the task
    /// can no longer be interrupted.
    pub async fn settle(&self, job_id: &str) -> Settlement {
        loop {
            // Registered before the check so a resolution in between is seen.
            let changed = self.phase_changed.notified();
            {
                let mut current = self.current.write().await;
                match current.as_mut() {
                    Some(active) if active.job_id == job_id => match active.phase {
                        ActivePhase::Running | ActivePhase::Settled => {
                            active.phase = ActivePhase::Settled;
                            return Settlement::Report;
                        }
                        ActivePhase::Interrupted => return Settlement::Interrupted,
                        ActivePhase::Interrupting => {}
                    },
                    _ => return Settlement::Report,
                }
            }
            tracing::debug!(job_id, "Waiting for the backend to answer an interrupt");
            changed.await;
        }
    }
}
