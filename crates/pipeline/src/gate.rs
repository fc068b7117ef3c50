//! Admission control in front of the generation backend.
//!
//! The backend can only run one generation at a time, so the gate is
//! configured with a single permit. Waiters are served in FIFO order.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Number of tasks allowed to execute concurrently.
pub const MAX_CONCURRENT_TASKS: usize = 1;

/// Returned by [`AdmissionGate::acquire`] if the semaphore has been closed.
#[derive(Debug, thiserror::Error)]
#[error("Admission gate is closed")]
pub struct GateClosed;

/// Counting permit gate. Cheap to clone; clones share the same permits.
#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
}

/// A held admission. Dropping it releases the permit.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Suspend until a permit is free.
    pub async fn acquire(&self) -> Result<AdmissionPermit, GateClosed> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(AdmissionPermit { _permit: permit })
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_TASKS)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let gate = AdmissionGate::default();
        let first = gate.acquire().await.unwrap();
        assert_eq!(gate.semaphore.available_permits(), 0);

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be admitted after release")
            .unwrap()
            .unwrap();
        assert_eq!(gate.semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn permit_released_when_holder_panics() {
        let gate = AdmissionGate::default();
        let task_gate = gate.clone();
        let result = tokio::spawn(async move {
            let _permit = task_gate.acquire().await.unwrap();
            panic!("boom");
        })
        .await;
        assert!(result.is_err());
        assert_eq!(gate.semaphore.available_permits(), 1);
    }
}
