//! FIFO of tasks waiting for the worker.

use std::collections::VecDeque;

use navigator_core::task::Task;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Task queue is empty")]
    Empty,
}

/// Result of [`TaskQueue::remove_owned`].
#[derive(Debug)]
pub enum RemoveOutcome {
    Removed(Task),
    /// The task is queued but belongs to someone else. It was left in place.
    NotOwner,
    Missing,
}

/// Pending tasks in arrival order. Safe for many producers and one consumer.
#[derive(Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task and return its 1-based position, which is also
    /// recorded as the task's `queue_size`.
    pub async fn push(&self, mut task: Task) -> usize {
        let mut queue = self.inner.lock().await;
        let position = queue.len() + 1;
        task.queue_size = Some(position);
        queue.push_back(task);
        position
    }

    /// Remove and return the oldest task.
    pub async fn pop_front(&self) -> Result<Task, QueueError> {
        self.try_pop().await.ok_or(QueueError::Empty)
    }

    pub async fn try_pop(&self) -> Option<Task> {
        self.inner.lock().await.pop_front()
    }

    /// Remove the task with `job_id`. Returns `false` if it was not queued.
    pub async fn remove_by_id(&self, job_id: &str) -> bool {
        let mut queue = self.inner.lock().await;
        match queue.iter().position(|t| t.job_id == job_id) {
            Some(index) => queue.remove(index).is_some(),
            None => false,
        }
    }

    /// Remove the task with `job_id` only if `owner_id` submitted it.
    pub async fn remove_owned(&self, job_id: &str, owner_id: &str) -> RemoveOutcome {
        let mut queue = self.inner.lock().await;
        let Some(index) = queue.iter().position(|t| t.job_id == job_id) else {
            return RemoveOutcome::Missing;
        };
        if queue[index].owner_id != owner_id {
            return RemoveOutcome::NotOwner;
        }
        match queue.remove(index) {
            Some(task) => RemoveOutcome::Removed(task),
            None => RemoveOutcome::Missing,
        }
    }

    pub async fn contains_id(&self, job_id: &str) -> bool {
        self.inner.lock().await.iter().any(|t| t.job_id == job_id)
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.len()
    }
}
