//! Shared fakes for pipeline tests: a scripted backend, an in-memory image
//! store and a sink that records every event.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use navigator_core::error::CoreError;
use navigator_core::store::{ImageStore, NewImageRecord, StoredImage};
use navigator_core::task::{Task, TaskKind, Txt2ImgParams};
use navigator_events::NotificationSink;
use navigator_forge::models::{
    ForgeOptions, GenerationResponse, InternalProgress, ProgressResponse, ProgressState, Sampler,
    Scheduler, SdModel, Upscaler,
};
use navigator_forge::payload::{Img2ImgPayload, Txt2ImgPayload};
use navigator_forge::{ForgeApiError, GenerationBackend};
use navigator_pipeline::{Pipeline, PipelineConfig};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Outcome of one scripted generation call.
#[derive(Debug, Clone)]
pub enum Script {
    Image { seed: i64 },
    NoImages,
    Fail { status: u16, body: String },
    Panic,
}

pub struct FakeBackend {
    scripts: Mutex<VecDeque<Script>>,
    pub payloads: Mutex<Vec<Value>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// When set, each generation waits for [`release_one`](Self::release_one).
    pub hold_generation: AtomicBool,
    release: Semaphore,
    /// Answer to `/internal/progress`.
    pub active_on_backend: AtomicBool,
    pub interrupts: AtomicUsize,
    pub fail_interrupt: AtomicBool,
    /// Let the held generation finish, then refuse the interrupt.
    pub refuse_interrupt_late: AtomicBool,
    /// `progress` and `internal_progress` answer with errors.
    pub fail_progress: AtomicBool,
    /// `progress` carries no preview image.
    pub no_preview: AtomicBool,
    /// When set, `png_info` waits for [`release_png_info`](Self::release_png_info).
    pub hold_png_info: AtomicBool,
    png_release: Semaphore,
    pub unloads: AtomicUsize,
    pub fail_unload: AtomicBool,
    pub current_model: Mutex<Option<String>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            payloads: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hold_generation: AtomicBool::new(false),
            release: Semaphore::new(0),
            active_on_backend: AtomicBool::new(true),
            interrupts: AtomicUsize::new(0),
            fail_interrupt: AtomicBool::new(false),
            refuse_interrupt_late: AtomicBool::new(false),
            fail_progress: AtomicBool::new(false),
            no_preview: AtomicBool::new(false),
            hold_png_info: AtomicBool::new(false),
            png_release: Semaphore::new(0),
            unloads: AtomicUsize::new(0),
            fail_unload: AtomicBool::new(false),
            current_model: Mutex::new(None),
        }
    }
}

impl FakeBackend {
    pub fn script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn release_one(&self) {
        self.release.add_permits(1);
    }

    pub fn release_png_info(&self) {
        self.png_release.add_permits(1);
    }

    fn check_progress_up(&self) -> Result<(), ForgeApiError> {
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(ForgeApiError::Decode("progress endpoint unavailable".into()));
        }
        Ok(())
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    async fn generate(&self, payload: Value) -> Result<GenerationResponse, ForgeApiError> {
        self.payloads.lock().unwrap().push(payload);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hold_generation.load(Ordering::SeqCst) {
            self.release.acquire().await.unwrap().forget();
        } else {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Image { seed: 1 });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script {
            Script::Image { seed } => Ok(GenerationResponse {
                images: vec!["RklOQUw=".to_string()],
                info: format!(r#"{{"seed": {seed}}}"#),
            }),
            Script::NoImages => Ok(GenerationResponse {
                images: vec![],
                info: "{}".to_string(),
            }),
            Script::Fail { status, body } => Err(ForgeApiError::ApiError { status, body }),
            Script::Panic => panic!("scripted backend panic"),
        }
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn txt2img(&self, payload: &Txt2ImgPayload) -> Result<GenerationResponse, ForgeApiError> {
        self.generate(serde_json::to_value(payload).unwrap()).await
    }

    async fn img2img(&self, payload: &Img2ImgPayload) -> Result<GenerationResponse, ForgeApiError> {
        self.generate(serde_json::to_value(payload).unwrap()).await
    }

    async fn progress(&self) -> Result<ProgressResponse, ForgeApiError> {
        self.check_progress_up()?;
        let current_image =
            (!self.no_preview.load(Ordering::SeqCst)).then(|| "UFJFVklFVw==".to_string());
        Ok(ProgressResponse {
            progress: 0.5,
            eta_relative: 4.0,
            state: ProgressState {
                sampling_step: 10,
                sampling_steps: 20,
            },
            current_image,
        })
    }

    async fn internal_progress(&self, _id_task: &str) -> Result<InternalProgress, ForgeApiError> {
        self.check_progress_up()?;
        Ok(InternalProgress {
            active: self.active_on_backend.load(Ordering::SeqCst),
            ..Default::default()
        })
    }

    async fn interrupt(&self) -> Result<(), ForgeApiError> {
        if self.refuse_interrupt_late.load(Ordering::SeqCst) {
            self.release_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
            return Err(ForgeApiError::ApiError {
                status: 500,
                body: "too late".into(),
            });
        }
        if self.fail_interrupt.load(Ordering::SeqCst) {
            return Err(ForgeApiError::ApiError {
                status: 500,
                body: "nope".into(),
            });
        }
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        self.release_one();
        Ok(())
    }

    async fn unload_checkpoint(&self) -> Result<(), ForgeApiError> {
        if self.fail_unload.load(Ordering::SeqCst) {
            return Err(ForgeApiError::ApiError {
                status: 500,
                body: "busy".into(),
            });
        }
        self.unloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn png_info(&self, _image: &str) -> Result<Value, ForgeApiError> {
        if self.hold_png_info.load(Ordering::SeqCst) {
            self.png_release.acquire().await.unwrap().forget();
        }
        Ok(serde_json::json!({
            "info": "a cat\nSteps: 20, Seed: 1, Size: 512x512, Model: m",
            "parameters": { "Seed": 1, "Size-1": 512, "Size-2": 512 }
        }))
    }

    async fn options(&self) -> Result<ForgeOptions, ForgeApiError> {
        Ok(ForgeOptions {
            sd_model_checkpoint: self.current_model.lock().unwrap().clone(),
        })
    }

    async fn samplers(&self) -> Result<Vec<Sampler>, ForgeApiError> {
        Ok(vec![Sampler {
            name: "DPM++ 2M".into(),
            aliases: vec![],
        }])
    }

    async fn schedulers(&self) -> Result<Vec<Scheduler>, ForgeApiError> {
        Ok(vec![])
    }

    async fn upscalers(&self) -> Result<Vec<Upscaler>, ForgeApiError> {
        Ok(vec![Upscaler {
            name: "4x_NMKD-Siax_200k".into(),
            model_name: None,
            scale: Some(4.0),
        }])
    }

    async fn sd_models(&self) -> Result<Vec<SdModel>, ForgeApiError> {
        Ok(vec![])
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub images: Mutex<HashMap<String, StoredImage>>,
    pub metadata: Mutex<HashMap<String, Value>>,
    pub fail_final_writes: AtomicBool,
}

impl MemoryStore {
    pub fn image(&self, job_id: &str) -> Option<StoredImage> {
        self.images.lock().unwrap().get(job_id).cloned()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn create_job_record(&self, record: &NewImageRecord) -> Result<(), CoreError> {
        self.images.lock().unwrap().insert(
            record.job_id.clone(),
            StoredImage {
                job_id: record.job_id.clone(),
                owner_id: record.owner_id.clone(),
                category_id: record.category_id,
                image_data: None,
                preview_data: None,
            },
        );
        Ok(())
    }

    async fn write_final_image(&self, job_id: &str, image_data: &str) -> Result<(), CoreError> {
        if self.fail_final_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("disk full".into()));
        }
        let mut images = self.images.lock().unwrap();
        let row = images.get_mut(job_id).ok_or(CoreError::NotFound {
            entity: "image",
            id: job_id.to_string(),
        })?;
        row.image_data = Some(image_data.to_string());
        Ok(())
    }

    async fn write_preview(&self, job_id: &str, preview_data: &str) -> Result<(), CoreError> {
        if let Some(row) = self.images.lock().unwrap().get_mut(job_id) {
            row.preview_data = Some(preview_data.to_string());
        }
        Ok(())
    }

    async fn get_image_by_id(&self, job_id: &str) -> Result<Option<StoredImage>, CoreError> {
        Ok(self.image(job_id))
    }

    async fn get_image_metadata(&self, job_id: &str) -> Result<Option<Value>, CoreError> {
        Ok(self.metadata.lock().unwrap().get(job_id).cloned())
    }

    async fn set_image_metadata(&self, job_id: &str, metadata: &Value) -> Result<(), CoreError> {
        self.metadata
            .lock()
            .unwrap()
            .insert(job_id.to_string(), metadata.clone());
        Ok(())
    }

    async fn delete_image_record(&self, job_id: &str) -> Result<bool, CoreError> {
        Ok(self.images.lock().unwrap().remove(job_id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Recorded {
    pub origin: Option<String>,
    pub event: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn named(&self, event: &str) -> Vec<Recorded> {
        self.events().into_iter().filter(|e| e.event == event).collect()
    }

    /// Wait until `pred` holds over the recorded events, or panic.
    pub async fn wait_for(&self, what: &str, pred: impl Fn(&[Recorded]) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if pred(&self.events()) {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {what}; events: {:?}", self.events());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn wait_for_count(&self, event: &str, count: usize) {
        self.wait_for(event, |events| {
            events.iter().filter(|e| e.event == event).count() >= count
        })
        .await;
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, origin: &str, event: &str, payload: Value) {
        self.events.lock().unwrap().push(Recorded {
            origin: Some(origin.to_string()),
            event: event.to_string(),
            payload,
        });
    }

    fn broadcast(&self, event: &str, payload: Value) {
        self.events.lock().unwrap().push(Recorded {
            origin: None,
            event: event.to_string(),
            payload,
        });
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig {
            progress_interval: Duration::from_millis(20),
            idle_delay: Duration::from_millis(5),
            checkpoint_unload_after: None,
        })
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(MemoryStore::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Pipeline::new(backend.clone(), store.clone(), sink.clone(), config);
        Self {
            backend,
            store,
            sink,
            pipeline,
        }
    }

    /// Allocate a row and queue a txt2img task.
    pub async fn submit(&self, task: Task) {
        self.store
            .create_job_record(&NewImageRecord {
                job_id: task.job_id.clone(),
                owner_id: task.owner_id.clone(),
                category_id: task.category_id,
            })
            .await
            .unwrap();
        self.pipeline.scheduler.enqueue(task).await;
    }

    /// Move the worker onto its own task.
    pub fn start(self) -> (Running, CancellationToken) {
        let cancel = CancellationToken::new();
        let Harness {
            backend,
            store,
            sink,
            pipeline,
        } = self;
        let Pipeline {
            scheduler,
            context,
            worker,
            ..
        } = pipeline;
        let token = cancel.clone();
        let handle = tokio::spawn(async move { worker.run(token).await });
        (
            Running {
                backend,
                store,
                sink,
                scheduler,
                context,
                handle,
            },
            cancel,
        )
    }
}

pub struct Running {
    pub backend: Arc<FakeBackend>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub scheduler: Arc<navigator_pipeline::JobScheduler>,
    pub context: Arc<navigator_pipeline::ExecutionContext>,
    pub handle: tokio::task::JoinHandle<()>,
}

impl Running {
    pub async fn submit(&self, task: Task) {
        self.store
            .create_job_record(&NewImageRecord {
                job_id: task.job_id.clone(),
                owner_id: task.owner_id.clone(),
                category_id: task.category_id,
            })
            .await
            .unwrap();
        self.scheduler.enqueue(task).await;
    }

    pub async fn wait_until_current(&self, job_id: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self
            .context
            .current()
            .await
            .is_none_or(|a| a.job_id != job_id)
        {
            assert!(tokio::time::Instant::now() < deadline, "{job_id} never started");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

pub fn txt2img(job_id: &str, owner: &str) -> Task {
    let mut params = Txt2ImgParams::new("model-a", "a lighthouse at dusk");
    params.negative_prompt = "blurry".into();
    Task::new(job_id, owner, "10.0.0.7", TaskKind::Txt2Img(params))
}

pub fn txt2img_with(job_id: &str, f: impl FnOnce(&mut Txt2ImgParams)) -> Task {
    let mut task = txt2img(job_id, "owner-1");
    if let TaskKind::Txt2Img(params) = &mut task.kind {
        f(params);
    }
    task
}
