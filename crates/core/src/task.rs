//! The in-memory unit of work moved through the queue and the executor.
//!
//! A [`Task`] is created by a producer once its parameters have been
//! validated and its image row allocated, then lives in memory until the
//! worker has finished with it. Only the persisted image outlives it.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, JobId, OwnerId};

// ---------------------------------------------------------------------------
// Defaults applied by producers
// ---------------------------------------------------------------------------

pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_STEPS: u32 = 50;
pub const DEFAULT_SEED: i64 = -1;
pub const DEFAULT_CFG_SCALE: f64 = 7.0;
pub const DEFAULT_DISTILLED_CFG: f64 = 3.5;
pub const DEFAULT_SAMPLER: &str = "DPM++ 2M";
pub const DEFAULT_SCHEDULER: &str = "automatic";
/// img2img keeps most of the source image unless told otherwise.
pub const DEFAULT_IMG2IMG_DENOISING: f64 = 0.75;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a task.
///
/// `Queued -> Started -> Processing -> {Finished | Failed | Interrupted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Started,
    Processing,
    Finished,
    Failed,
    Interrupted,
}

impl TaskStatus {
    /// `true` while the task holds the admission permit.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Started | Self::Processing)
    }

    /// `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Interrupted)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Variation seed and its blend strength. Sent together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Subseed {
    pub seed: i64,
    pub strength: f64,
}

impl Subseed {
    /// Build a pair only when both halves are present and non-zero.
    pub fn from_parts(seed: Option<i64>, strength: Option<f64>) -> Option<Self> {
        match (seed, strength) {
            (Some(seed), Some(strength)) if seed != 0 && strength != 0.0 => {
                Some(Self { seed, strength })
            }
            _ => None,
        }
    }
}

/// Parameters of a text-to-image job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Txt2ImgParams {
    pub model_name: String,
    pub prompt: String,
    pub negative_prompt: String,
    /// `-1` lets the backend pick a random seed.
    pub seed: i64,
    pub sampler_name: String,
    pub scheduler_name: String,
    pub steps: u32,
    /// Requested second-pass steps when HR-fix is forced.
    pub hrf_steps: u32,
    pub cfg_scale: f64,
    pub distilled_cfg: f64,
    pub width: u32,
    pub height: u32,
    /// `0.0` means "not supplied".
    pub denoising_strength: f64,
    pub subseed: Option<Subseed>,
    pub force_hr_fix: bool,
    pub upscaler_name: Option<String>,
    /// Previously generated low-res image reused as the HR-fix first pass.
    pub first_pass_image: Option<String>,
    pub image_enhancements: bool,
    pub modules: Vec<String>,
}

impl Txt2ImgParams {
    /// Parameters with every optional field at its producer default.
    pub fn new(model_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            prompt: prompt.into(),
            negative_prompt: String::new(),
            seed: DEFAULT_SEED,
            sampler_name: DEFAULT_SAMPLER.to_string(),
            scheduler_name: DEFAULT_SCHEDULER.to_string(),
            steps: DEFAULT_STEPS,
            hrf_steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            distilled_cfg: DEFAULT_DISTILLED_CFG,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            denoising_strength: 0.0,
            subseed: None,
            force_hr_fix: false,
            upscaler_name: None,
            first_pass_image: None,
            image_enhancements: false,
            modules: Vec::new(),
        }
    }
}

/// Parameters of an image-to-image (optionally inpainting) job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Img2ImgParams {
    pub model_name: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub subseed: Option<Subseed>,
    pub sampler_name: String,
    pub scheduler_name: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub denoising_strength: f64,
    /// Base64 source image.
    pub init_image: Option<String>,
    /// Base64 inpainting mask. Empty strings are treated as absent.
    pub mask: Option<String>,
    pub image_enhancements: bool,
}

impl Img2ImgParams {
    pub fn new(model_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            prompt: prompt.into(),
            negative_prompt: String::new(),
            seed: DEFAULT_SEED,
            subseed: None,
            sampler_name: DEFAULT_SAMPLER.to_string(),
            scheduler_name: DEFAULT_SCHEDULER.to_string(),
            steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            denoising_strength: DEFAULT_IMG2IMG_DENOISING,
            init_image: None,
            mask: None,
            image_enhancements: false,
        }
    }

    /// The mask, if one was supplied and is non-empty.
    pub fn effective_mask(&self) -> Option<&str> {
        self.mask.as_deref().filter(|m| !m.is_empty())
    }
}

/// What kind of generation a task performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskKind {
    Txt2Img(Txt2ImgParams),
    Img2Img(Img2ImgParams),
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A queued or executing generation job.
#[derive(Debug, Clone)]
pub struct Task {
    pub job_id: JobId,
    pub owner_id: OwnerId,
    /// Network address of the requester, used for directed notifications.
    pub origin: String,
    pub category_id: Option<DbId>,
    pub status: TaskStatus,
    /// Position hint at admission time. Cleared once execution starts.
    pub queue_size: Option<usize>,
    pub kind: TaskKind,
}

impl Task {
    /// Create a task in the `queued` state.
    pub fn new(
        job_id: impl Into<JobId>,
        owner_id: impl Into<OwnerId>,
        origin: impl Into<String>,
        kind: TaskKind,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            owner_id: owner_id.into(),
            origin: origin.into(),
            category_id: None,
            status: TaskStatus::Queued,
            queue_size: None,
            kind,
        }
    }

    pub fn with_category(mut self, category_id: Option<DbId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Wire name of the task kind (`"txt2img"` / `"img2img"`).
    pub fn task_type(&self) -> &'static str {
        match self.kind {
            TaskKind::Txt2Img(_) => "txt2img",
            TaskKind::Img2Img(_) => "img2img",
        }
    }

    /// Checkpoint the backend must load for this task.
    pub fn model_name(&self) -> &str {
        match &self.kind {
            TaskKind::Txt2Img(p) => &p.model_name,
            TaskKind::Img2Img(p) => &p.model_name,
        }
    }

    pub fn seed(&self) -> i64 {
        match &self.kind {
            TaskKind::Txt2Img(p) => p.seed,
            TaskKind::Img2Img(p) => p.seed,
        }
    }

    /// Record the seed the backend actually used.
    pub fn set_seed(&mut self, seed: i64) {
        match &mut self.kind {
            TaskKind::Txt2Img(p) => p.seed = seed,
            TaskKind::Img2Img(p) => p.seed = seed,
        }
    }

    /// Externally visible projection, safe to push over the network.
    ///
    /// Prompts, owner id, dimensions and any embedded image payloads are
    /// left out.
    pub fn summary(&self) -> TaskSummary {
        let mut summary = TaskSummary {
            job_id: self.job_id.clone(),
            task_type: self.task_type(),
            status: self.status,
            origin: self.origin.clone(),
            category_id: self.category_id,
            queue_size: self.queue_size,
            model_name: self.model_name().to_string(),
            seed: self.seed(),
            sampler_name: String::new(),
            scheduler_name: String::new(),
            steps: 0,
            cfg_scale: 0.0,
            denoising_strength: 0.0,
            hrf_steps: None,
            force_hr_fix: None,
            upscaler_name: None,
            image_enhancements: false,
        };
        match &self.kind {
            TaskKind::Txt2Img(p) => {
                summary.sampler_name = p.sampler_name.clone();
                summary.scheduler_name = p.scheduler_name.clone();
                summary.steps = p.steps;
                summary.cfg_scale = p.cfg_scale;
                summary.denoising_strength = p.denoising_strength;
                summary.hrf_steps = Some(p.hrf_steps);
                summary.force_hr_fix = Some(p.force_hr_fix);
                summary.upscaler_name = p.upscaler_name.clone();
                summary.image_enhancements = p.image_enhancements;
            }
            TaskKind::Img2Img(p) => {
                summary.sampler_name = p.sampler_name.clone();
                summary.scheduler_name = p.scheduler_name.clone();
                summary.steps = p.steps;
                summary.cfg_scale = p.cfg_scale;
                summary.denoising_strength = p.denoising_strength;
                summary.image_enhancements = p.image_enhancements;
            }
        }
        summary
    }
}

/// Sanitized view of a [`Task`] used in every lifecycle event payload and
/// in producer responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub job_id: JobId,
    pub task_type: &'static str,
    pub status: TaskStatus,
    pub origin: String,
    #[serde(rename = "categoryId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
    pub model_name: String,
    pub seed: i64,
    pub sampler_name: String,
    pub scheduler_name: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub denoising_strength: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hrf_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_hr_fix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upscaler_name: Option<String>,
    pub image_enhancements: bool,
}

impl TaskSummary {
    /// The summary as a JSON event payload.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// The summary with the fields of `extra` merged on top.
    pub fn payload_with(&self, extra: serde_json::Value) -> serde_json::Value {
        let mut payload = self.payload();
        if let (Some(base), serde_json::Value::Object(extra)) = (payload.as_object_mut(), extra) {
            base.extend(extra);
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt2img_task() -> Task {
        let mut params = Txt2ImgParams::new("sdxl_base", "a lighthouse at dusk");
        params.negative_prompt = "blurry".into();
        params.first_pass_image = Some("iVBORw0KGgo=".into());
        Task::new("ab12cd34", "owner-1", "10.0.0.7", TaskKind::Txt2Img(params))
    }

    #[test]
    fn new_task_is_queued() {
        let task = txt2img_task();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.task_type(), "txt2img");
        assert_eq!(task.model_name(), "sdxl_base");
    }

    #[test]
    fn summary_strips_large_and_private_fields() {
        let json = serde_json::to_value(txt2img_task().summary()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "prompt",
            "negative_prompt",
            "owner_id",
            "width",
            "height",
            "first_pass_image",
            "init_image",
            "mask",
        ] {
            assert!(!obj.contains_key(key), "summary must not expose {key}");
        }
        assert_eq!(json["job_id"], "ab12cd34");
        assert_eq!(json["status"], "queued");
        assert_eq!(json["task_type"], "txt2img");
    }

    #[test]
    fn summary_omits_queue_size_once_cleared() {
        let mut task = txt2img_task();
        task.queue_size = Some(3);
        assert_eq!(serde_json::to_value(task.summary()).unwrap()["queue_size"], 3);

        task.queue_size = None;
        let json = serde_json::to_value(task.summary()).unwrap();
        assert!(json.get("queue_size").is_none());
    }

    #[test]
    fn payload_with_merges_extra_fields() {
        let payload = txt2img_task()
            .summary()
            .payload_with(serde_json::json!({"img_path": "/api/images/ab12cd34"}));
        assert_eq!(payload["img_path"], "/api/images/ab12cd34");
        assert_eq!(payload["job_id"], "ab12cd34");
    }

    #[test]
    fn set_seed_updates_either_kind() {
        let mut task = txt2img_task();
        task.set_seed(1234);
        assert_eq!(task.seed(), 1234);

        let mut task = Task::new(
            "x",
            "o",
            "127.0.0.1",
            TaskKind::Img2Img(Img2ImgParams::new("m", "p")),
        );
        task.set_seed(99);
        assert_eq!(task.seed(), 99);
    }

    #[test]
    fn subseed_requires_both_halves() {
        assert_eq!(Subseed::from_parts(Some(5), None), None);
        assert_eq!(Subseed::from_parts(None, Some(0.3)), None);
        assert_eq!(Subseed::from_parts(Some(5), Some(0.0)), None);
        assert_eq!(
            Subseed::from_parts(Some(5), Some(0.3)),
            Some(Subseed { seed: 5, strength: 0.3 })
        );
    }

    #[test]
    fn empty_mask_is_not_a_mask() {
        let mut params = Img2ImgParams::new("m", "p");
        params.mask = Some(String::new());
        assert!(params.effective_mask().is_none());
        params.mask = Some("bWFzaw==".into());
        assert_eq!(params.effective_mask(), Some("bWFzaw=="));
    }

    #[test]
    fn status_classification() {
        assert!(TaskStatus::Started.is_active());
        assert!(TaskStatus::Processing.is_active());
        assert!(!TaskStatus::Queued.is_active());
        assert!(TaskStatus::Interrupted.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }
}
