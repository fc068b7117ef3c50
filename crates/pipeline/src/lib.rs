//! Single-worker job pipeline.
//!
//! Producers hand validated tasks to the [`JobScheduler`], which appends
//! them to the FIFO [`TaskQueue`]. One [`WorkerLoop`] per process takes an
//! [`AdmissionGate`] permit, pops the oldest task and runs it through the
//! [`TaskExecutor`] against the generation backend. The permit is released
//! when the task settles, so at most one task is ever in flight. An optional
//! [`CheckpointUnloader`] frees the backend's checkpoint once it sits idle.

pub mod builder;
pub mod context;
pub mod executor;
pub mod gate;
pub mod progress;
pub mod queue;
pub mod scheduler;
pub mod unload;
pub mod worker;

pub use builder::{Pipeline, PipelineConfig};
pub use context::{ActivePhase, ActiveTask, ExecutionContext};
pub use executor::{ExecutionError, TaskExecutor};
pub use gate::{AdmissionGate, AdmissionPermit};
pub use queue::{QueueError, TaskQueue};
pub use scheduler::{InterruptError, InterruptOutcome, JobScheduler};
pub use unload::{CheckpointUnloader, UnloadCheck};
pub use worker::WorkerLoop;
