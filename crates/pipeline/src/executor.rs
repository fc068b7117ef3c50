//! Drives one task through the generation backend.
//!
//! Runs only while the worker holds the admission permit. Every outcome is
//! reported to the task's origin; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use navigator_core::error::CoreError;
use navigator_core::hires::resolve_hr_fix;
use navigator_core::job_events::{
    image_path, EVENT_MODEL_CHANGED, EVENT_TASK_FAILED, EVENT_TASK_FINISHED, EVENT_TASK_STARTED,
};
use navigator_core::store::ImageStore;
use navigator_core::task::{Task, TaskKind, TaskStatus};
use navigator_events::NotificationSink;
use navigator_forge::models::GenerationResponse;
use navigator_forge::payload::{Img2ImgPayload, Txt2ImgPayload};
use navigator_forge::{ForgeApiError, GenerationBackend, ParameterResolver};

use crate::context::{ExecutionContext, Settlement};
use crate::progress::{ProgressDeps, ProgressPoller};

/// Why a task ended up `failed`.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The backend answered but produced nothing.
    #[error("No images were generated.")]
    NoImages,

    /// The generation call or a catalog lookup failed.
    #[error("{0}")]
    Backend(#[from] ForgeApiError),

    /// The result could not be persisted.
    #[error("{0}")]
    Storage(#[from] CoreError),
}

/// Request prepared for the backend.
enum Prepared {
    Txt2Img(Txt2ImgPayload),
    Img2Img(Img2ImgPayload),
}

pub struct TaskExecutor {
    backend: Arc<dyn GenerationBackend>,
    resolver: Arc<ParameterResolver>,
    store: Arc<dyn ImageStore>,
    sink: Arc<dyn NotificationSink>,
    context: Arc<ExecutionContext>,
    progress_interval: Duration,
}

impl TaskExecutor {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        resolver: Arc<ParameterResolver>,
        store: Arc<dyn ImageStore>,
        sink: Arc<dyn NotificationSink>,
        context: Arc<ExecutionContext>,
        progress_interval: Duration,
    ) -> Self {
        Self {
            backend,
            resolver,
            store,
            sink,
            context,
            progress_interval,
        }
    }

    /// Run `task` to a terminal state.
    ///
    /// On failure the task is already marked `failed` and `task-failed` has
    /// been sent; the error is returned for logging only.
    pub async fn execute(&self, task: &mut Task) -> Result<(), ExecutionError> {
        self.sink
            .notify(&task.origin, EVENT_TASK_STARTED, task.summary().payload());
        task.status = TaskStatus::Processing;
        tracing::info!(job_id = %task.job_id, task_type = task.task_type(), "Processing task");

        let generated = self.generate(task).await;

        // From here on an interrupt can no longer claim the task.
        if self.context.settle(&task.job_id).await == Settlement::Interrupted {
            task.status = TaskStatus::Interrupted;
            match &generated {
                Ok(_) => tracing::info!(job_id = %task.job_id, "Interrupted task settled"),
                Err(e) => tracing::info!(
                    job_id = %task.job_id,
                    error = %e,
                    "Interrupted task settled with error",
                ),
            }
            return Ok(());
        }

        let response = match generated {
            Ok(response) => response,
            Err(e) => return self.fail(task, e),
        };

        let Some(image) = response.images.first() else {
            return self.fail(task, ExecutionError::NoImages);
        };

        if let Some(seed) = response.seed() {
            task.set_seed(seed);
        }

        if let Err(e) = self.store.write_final_image(&task.job_id, image).await {
            return self.fail(task, e.into());
        }

        task.status = TaskStatus::Finished;
        tracing::info!(job_id = %task.job_id, "Task finished");
        self.sink.notify(
            &task.origin,
            EVENT_TASK_FINISHED,
            task.summary()
                .payload_with(serde_json::json!({ "img_path": image_path(&task.job_id) })),
        );

        self.cache_image_info(task, image).await;
        Ok(())
    }

    /// Mark `task` failed and tell its origin. Also used by the worker when
    /// execution panicked.
    pub fn report_failure(&self, task: &mut Task, error: &str) {
        task.status = TaskStatus::Failed;
        self.sink.notify(
            &task.origin,
            EVENT_TASK_FAILED,
            task.summary()
                .payload_with(serde_json::json!({ "error": error })),
        );
    }

    fn fail(&self, task: &mut Task, error: ExecutionError) -> Result<(), ExecutionError> {
        tracing::error!(job_id = %task.job_id, error = %error, "Task failed");
        self.report_failure(task, &error.to_string());
        Err(error)
    }

    /// Build the payload, announce model switches, dispatch and wait.
    async fn generate(&self, task: &mut Task) -> Result<GenerationResponse, ExecutionError> {
        let prepared = self.prepare(task).await?;

        let model = task.model_name().to_string();
        if self.context.swap_model(&model).await {
            tracing::info!(job_id = %task.job_id, model = %model, "Backend model will change");
            self.sink.notify(
                &task.origin,
                EVENT_MODEL_CHANGED,
                serde_json::json!({ "model_name": model, "job_id": task.job_id }),
            );
        }

        let poller = ProgressPoller::spawn(
            ProgressDeps {
                backend: Arc::clone(&self.backend),
                store: Arc::clone(&self.store),
                sink: Arc::clone(&self.sink),
            },
            task.summary(),
            self.progress_interval,
        );

        tracing::debug!(job_id = %task.job_id, "Sending task to backend");
        poller.mark_dispatched();
        let result = match &prepared {
            Prepared::Txt2Img(payload) => self.backend.txt2img(payload).await,
            Prepared::Img2Img(payload) => self.backend.img2img(payload).await,
        };
        drop(poller);

        Ok(result?)
    }

    async fn prepare(&self, task: &mut Task) -> Result<Prepared, ExecutionError> {
        let job_id = task.job_id.clone();
        match &mut task.kind {
            TaskKind::Txt2Img(params) => {
                let upscaler = match params.upscaler_name.clone() {
                    Some(name) => name,
                    None => {
                        let name = self.resolver.validate_upscaler_name("").await?;
                        params.upscaler_name = Some(name.clone());
                        name
                    }
                };
                let plan = resolve_hr_fix(params);
                tracing::debug!(job_id = %job_id, mode = ?plan.mode, "Resolved HR-fix");
                Ok(Prepared::Txt2Img(Txt2ImgPayload::build(
                    &job_id, params, &upscaler, &plan,
                )))
            }
            TaskKind::Img2Img(params) => Ok(Prepared::Img2Img(Img2ImgPayload::build(&job_id, params))),
        }
    }

    /// Cache the image's generation info for later upscale requests.
    async fn cache_image_info(&self, task: &Task, image: &str) {
        let mut info = match self.backend.png_info(image).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(job_id = %task.job_id, error = %e, "Failed to read image info");
                return;
            }
        };
        if let Some(params) = info.get_mut("parameters").and_then(|p| p.as_object_mut()) {
            params.insert("owner_id".into(), serde_json::json!(task.owner_id));
        }
        if let Err(e) = self.store.set_image_metadata(&task.job_id, &info).await {
            tracing::warn!(job_id = %task.job_id, error = %e, "Failed to cache image info");
        }
    }
}
