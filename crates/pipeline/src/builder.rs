//! Wiring of the pipeline components around one backend.

use std::sync::Arc;
use std::time::Duration;

use navigator_core::store::ImageStore;
use navigator_events::NotificationSink;
use navigator_forge::{GenerationBackend, ParameterResolver};

use crate::context::ExecutionContext;
use crate::executor::TaskExecutor;
use crate::gate::AdmissionGate;
use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use crate::queue::TaskQueue;
use crate::scheduler::JobScheduler;
use crate::unload::CheckpointUnloader;
use crate::worker::{WorkerLoop, DEFAULT_IDLE_DELAY};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Time between progress checks while a task runs.
    pub progress_interval: Duration,
    /// Pause between checks of an empty queue.
    pub idle_delay: Duration,
    /// Unload the backend checkpoint after this long without a task.
    /// `None` keeps it loaded.
    pub checkpoint_unload_after: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            idle_delay: DEFAULT_IDLE_DELAY,
            checkpoint_unload_after: None,
        }
    }
}

/// Everything a process needs to accept and execute tasks.
///
/// `scheduler`, `resolver` and `context` are shared with request handlers;
/// `worker` and, when enabled, `unloader` are moved onto their own tokio
/// tasks.
pub struct Pipeline {
    pub scheduler: Arc<JobScheduler>,
    pub resolver: Arc<ParameterResolver>,
    pub context: Arc<ExecutionContext>,
    pub worker: WorkerLoop,
    pub unloader: Option<CheckpointUnloader>,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn ImageStore>,
        sink: Arc<dyn NotificationSink>,
        config: PipelineConfig,
    ) -> Self {
        let resolver = Arc::new(ParameterResolver::new(Arc::clone(&backend)));
        Self::with_resolver(backend, resolver, store, sink, config)
    }

    /// Like [`new`](Self::new) but sharing an existing resolver (and its
    /// catalog caches).
    pub fn with_resolver(
        backend: Arc<dyn GenerationBackend>,
        resolver: Arc<ParameterResolver>,
        store: Arc<dyn ImageStore>,
        sink: Arc<dyn NotificationSink>,
        config: PipelineConfig,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let context = Arc::new(ExecutionContext::new());

        let executor = Arc::new(TaskExecutor::new(
            Arc::clone(&backend),
            Arc::clone(&resolver),
            Arc::clone(&store),
            Arc::clone(&sink),
            Arc::clone(&context),
            config.progress_interval,
        ));

        let unloader = config.checkpoint_unload_after.map(|idle_after| {
            CheckpointUnloader::new(Arc::clone(&backend), Arc::clone(&context), idle_after)
        });

        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&context),
            backend,
            store,
            sink,
        ));

        let worker = WorkerLoop::new(
            AdmissionGate::default(),
            queue,
            Arc::clone(&context),
            executor,
            config.idle_delay,
        );

        Self {
            scheduler,
            resolver,
            context,
            worker,
            unloader,
        }
    }
}
