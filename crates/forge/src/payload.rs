//! Request bodies for Forge's `txt2img` and `img2img` endpoints.
//!
//! Payloads are built from validated task parameters and then adjusted by
//! the `apply_*` steps. Optional fields are omitted from the JSON entirely
//! rather than sent as `null`.

use serde::Serialize;
use serde_json::Value;

use navigator_core::hires::HrFixPlan;
use navigator_core::task::{Img2ImgParams, Txt2ImgParams};
use navigator_core::types::correlation_token;
use navigator_core::validation::MAX_IMG2IMG_STEPS;

use crate::scripts::enhancement_scripts;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideSettings {
    pub sd_model_checkpoint: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forge_additional_modules: Vec<String>,
}

impl OverrideSettings {
    fn checkpoint(model_name: &str) -> Self {
        Self {
            sd_model_checkpoint: model_name.to_string(),
            forge_additional_modules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// txt2img
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgPayload {
    pub force_task_id: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f64,
    pub distilled_cfg_scale: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub enable_hr: bool,
    pub hr_upscaler: String,
    pub hr_additional_modules: Vec<String>,
    pub save_images: bool,
    pub override_settings: OverrideSettings,
    pub override_settings_restore_afterwards: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hr_resize_x: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hr_resize_y: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hr_second_pass_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subseed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subseed_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstpass_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alwayson_scripts: Option<Value>,
}

impl Txt2ImgPayload {
    /// Base payload with no HR-fix, enhancements or first pass applied.
    pub fn new(job_id: &str, params: &Txt2ImgParams, upscaler_name: &str) -> Self {
        let mut override_settings = OverrideSettings::checkpoint(&params.model_name);
        override_settings.forge_additional_modules = params.modules.clone();

        Self {
            force_task_id: correlation_token(job_id),
            prompt: params.prompt.clone(),
            negative_prompt: params.negative_prompt.clone(),
            seed: params.seed,
            steps: params.steps,
            width: params.width,
            height: params.height,
            cfg_scale: params.cfg_scale,
            distilled_cfg_scale: params.distilled_cfg,
            sampler_name: params.sampler_name.clone(),
            scheduler: params.scheduler_name.clone(),
            enable_hr: false,
            hr_upscaler: upscaler_name.to_string(),
            hr_additional_modules: Vec::new(),
            save_images: false,
            override_settings,
            override_settings_restore_afterwards: false,
            denoising_strength: (params.denoising_strength > 0.0)
                .then_some(params.denoising_strength),
            hr_resize_x: None,
            hr_resize_y: None,
            hr_second_pass_steps: None,
            subseed: params.subseed.map(|s| s.seed),
            subseed_strength: params.subseed.map(|s| s.strength),
            firstpass_image: None,
            alwayson_scripts: None,
        }
    }

    /// Full payload for a task: HR-fix plan, enhancements and first pass.
    pub fn build(
        job_id: &str,
        params: &Txt2ImgParams,
        upscaler_name: &str,
        plan: &HrFixPlan,
    ) -> Self {
        let mut payload = Self::new(job_id, params, upscaler_name);
        payload.apply_hr_fix(plan);
        if params.image_enhancements {
            payload.apply_enhancements();
        }
        if let Some(image) = &params.first_pass_image {
            payload.apply_first_pass(image);
        }
        payload
    }

    pub fn apply_hr_fix(&mut self, plan: &HrFixPlan) {
        let Some(upscale) = plan.upscale else {
            return;
        };
        self.enable_hr = true;
        self.width = plan.base_width;
        self.height = plan.base_height;
        self.hr_resize_x = Some(upscale.resize_x);
        self.hr_resize_y = Some(upscale.resize_y);
        self.hr_second_pass_steps = Some(upscale.second_pass_steps);
        self.denoising_strength = Some(upscale.denoising_strength);
    }

    pub fn apply_enhancements(&mut self) {
        self.alwayson_scripts = Some(enhancement_scripts());
    }

    pub fn apply_first_pass(&mut self, image: &str) {
        self.firstpass_image = Some(image.to_string());
    }
}

// ---------------------------------------------------------------------------
// img2img
// ---------------------------------------------------------------------------

/// Inpainting settings, sent only alongside a non-empty mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InpaintingFields {
    pub mask: String,
    pub initial_noise_multiplier: f64,
    pub inpaint_full_res: u8,
    pub mask_blur: u32,
    pub mask_blur_x: u32,
    pub mask_blur_y: u32,
    pub mask_round: bool,
    pub inpainting_fill: u8,
    pub inpaint_full_res_padding: u32,
    pub inpainting_mask_invert: u8,
    pub image_cfg_scale: f64,
}

impl InpaintingFields {
    fn for_mask(mask: &str) -> Self {
        Self {
            mask: mask.to_string(),
            initial_noise_multiplier: 1.0,
            inpaint_full_res: 1,
            mask_blur: 4,
            mask_blur_x: 4,
            mask_blur_y: 4,
            mask_round: true,
            inpainting_fill: 1,
            inpaint_full_res_padding: 32,
            inpainting_mask_invert: 0,
            image_cfg_scale: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Img2ImgPayload {
    pub force_task_id: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub sampler_name: String,
    pub scheduler: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub denoising_strength: f64,
    pub init_images: Vec<String>,
    pub override_settings: OverrideSettings,
    pub save_images: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alwayson_scripts: Option<Value>,
    #[serde(flatten)]
    pub inpainting: Option<InpaintingFields>,
}

impl Img2ImgPayload {
    pub fn new(job_id: &str, params: &Img2ImgParams) -> Self {
        Self {
            force_task_id: correlation_token(job_id),
            prompt: params.prompt.clone(),
            negative_prompt: params.negative_prompt.clone(),
            seed: params.seed,
            subseed: params.subseed.map_or(-1, |s| s.seed),
            subseed_strength: params.subseed.map_or(0.0, |s| s.strength),
            sampler_name: params.sampler_name.clone(),
            scheduler: params.scheduler_name.clone(),
            steps: params.steps.min(MAX_IMG2IMG_STEPS),
            cfg_scale: params.cfg_scale,
            width: params.width,
            height: params.height,
            denoising_strength: params.denoising_strength,
            init_images: params.init_image.iter().cloned().collect(),
            override_settings: OverrideSettings::checkpoint(&params.model_name),
            save_images: false,
            alwayson_scripts: None,
            inpainting: None,
        }
    }

    pub fn build(job_id: &str, params: &Img2ImgParams) -> Self {
        let mut payload = Self::new(job_id, params);
        payload.apply_mask_data(params.effective_mask());
        if params.image_enhancements {
            payload.apply_enhancements();
        }
        payload
    }

    /// Attach inpainting settings. Absent or empty masks clear them.
    pub fn apply_mask_data(&mut self, mask: Option<&str>) {
        self.inpainting = mask
            .filter(|m| !m.is_empty())
            .map(InpaintingFields::for_mask);
    }

    pub fn apply_enhancements(&mut self) {
        self.alwayson_scripts = Some(enhancement_scripts());
    }
}
