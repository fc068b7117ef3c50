//! Periodic progress reporting while a generation call is in flight.
//!
//! The backend exposes progress globally, not per task, so each tick first
//! asks whether the backend is actually working on our correlation token.
//! Work started elsewhere (the backend's own UI, another gateway) is never
//! reported as ours.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use navigator_core::job_events::{preview_path, EVENT_TASK_PROGRESS};
use navigator_core::store::ImageStore;
use navigator_core::task::TaskSummary;
use navigator_core::types::correlation_token;
use navigator_events::NotificationSink;
use navigator_forge::GenerationBackend;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default time between progress checks.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(2500);

/// Handles the poller needs from the executor.
#[derive(Clone)]
pub struct ProgressDeps {
    pub backend: Arc<dyn GenerationBackend>,
    pub store: Arc<dyn ImageStore>,
    pub sink: Arc<dyn NotificationSink>,
}

/// A running poller. Dropping it stops polling.
pub struct ProgressPoller {
    cancel: CancellationToken,
    dispatched: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressPoller {
    /// Start polling for `summary.job_id` every `interval`.
    ///
    /// Ticks are skipped until [`mark_dispatched`](Self::mark_dispatched)
    /// is called.
    pub fn spawn(deps: ProgressDeps, summary: TaskSummary, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let dispatched = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(run(
            deps,
            summary,
            interval,
            cancel.clone(),
            Arc::clone(&dispatched),
        ));

        Self {
            cancel,
            dispatched,
            handle,
        }
    }

    /// The generation request has been handed to the backend.
    pub fn mark_dispatched(&self) {
        self.dispatched.store(true, Ordering::Release);
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

async fn run(
    deps: ProgressDeps,
    summary: TaskSummary,
    interval: Duration,
    cancel: CancellationToken,
    dispatched: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; progress starts one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !dispatched.load(Ordering::Acquire) {
                    continue;
                }
                poll_once(&deps, &summary).await;
            }
        }
    }
}

/// One progress check. Every failure is logged and swallowed.
async fn poll_once(deps: &ProgressDeps, summary: &TaskSummary) {
    let job_id = summary.job_id.as_str();

    match deps.backend.internal_progress(&correlation_token(job_id)).await {
        Ok(status) if status.active => {}
        Ok(_) => {
            tracing::debug!(
                job_id,
                "Backend is not working on this task, skipping progress check",
            );
            return;
        }
        Err(e) => {
            tracing::warn!(job_id, error = %e, "Failed to verify task on backend");
            return;
        }
    }

    let progress = match deps.backend.progress().await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(job_id, error = %e, "Failed to check progress");
            return;
        }
    };

    // No preview while the backend warms up. Expected, so not logged.
    let Some(preview) = progress.current_image.as_deref() else {
        return;
    };

    if let Err(e) = deps.store.write_preview(job_id, preview).await {
        tracing::warn!(job_id, error = %e, "Failed to store preview");
        return;
    }

    deps.sink.notify(
        &summary.origin,
        EVENT_TASK_PROGRESS,
        summary.payload_with(serde_json::json!({
            "progress": progress.progress,
            "eta_relative": progress.eta_relative,
            "current_step": progress.state.sampling_step,
            "total_steps": progress.state.sampling_steps,
            "progress_path": preview_path(job_id),
        })),
    );
}
