//! Notification event names for task lifecycle updates.
//!
//! Used by the pipeline when publishing to the event bus and by the
//! WebSocket layer when forwarding to clients.

/// A task left the queue and began executing.
pub const EVENT_TASK_STARTED: &str = "task-started";

/// Periodic progress report while the backend is generating.
pub const EVENT_TASK_PROGRESS: &str = "task-progress";

/// The backend is about to switch checkpoints.
pub const EVENT_MODEL_CHANGED: &str = "model-changed";

/// Final image persisted.
pub const EVENT_TASK_FINISHED: &str = "task-finished";

/// Generation or persistence failed.
pub const EVENT_TASK_FAILED: &str = "task-failed";

/// The active task was interrupted by its owner.
pub const EVENT_TASK_INTERRUPTED: &str = "task-interrupted";

/// The backend re-scanned its checkpoint directory. Broadcast to everyone.
pub const EVENT_MODELS_REFRESHED: &str = "models-refreshed";

/// Public path of a finished image.
pub fn image_path(job_id: &str) -> String {
    format!("/api/images/{job_id}")
}

/// Public path of the latest preview of a running task.
pub fn preview_path(job_id: &str) -> String {
    format!("/api/previews/{job_id}")
}
