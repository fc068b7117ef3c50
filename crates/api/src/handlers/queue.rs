//! Producers: validate a request, allocate the image row, and queue a task.
//!
//! The legacy bot endpoints take the owner id from the body and are only
//! mounted when enabled in config. The user endpoints take it from the
//! bearer token.

use axum::extract::{Path, State};
use axum::Json;
use navigator_core::error::CoreError;
use navigator_core::store::NewImageRecord;
use navigator_core::task::{
    Img2ImgParams, Subseed, Task, TaskKind, TaskSummary, Txt2ImgParams, DEFAULT_CFG_SCALE,
    DEFAULT_DISTILLED_CFG, DEFAULT_HEIGHT, DEFAULT_IMG2IMG_DENOISING, DEFAULT_SAMPLER,
    DEFAULT_SEED, DEFAULT_STEPS, DEFAULT_WIDTH,
};
use navigator_core::types::{generate_job_id, DbId, OwnerId};
use navigator_core::validation::{
    validate_pixel_count, validate_required_params, validate_upscale_pixel_count,
};
use navigator_db::repositories::{CategoryRepo, ModelRepo};
use navigator_forge::info::RecoveredParams;
use navigator_pipeline::InterruptOutcome;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::handlers::images::{find_finished, image_info};
use crate::middleware::auth::AuthUser;
use crate::middleware::client_addr::ClientAddr;
use crate::state::AppState;

/// An `init_image` of `NAVIGATOR_<job_id>` refers to a stored image.
pub const INIT_IMAGE_REFERENCE_PREFIX: &str = "NAVIGATOR_";

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, Validate)]
pub struct Txt2ImgRequest {
    /// Only read by the legacy endpoint.
    pub owner_id: Option<OwnerId>,
    pub model_name: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    #[validate(length(min = 1, max = 64, message = "job_id must be 1 to 64 characters"))]
    pub job_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[validate(range(min = 1, message = "steps must be at least 1"))]
    pub steps: Option<u32>,
    #[validate(range(min = 1, message = "hrf_steps must be at least 1"))]
    pub hrf_steps: Option<u32>,
    pub seed: Option<i64>,
    pub cfg_scale: Option<f64>,
    pub distilled_cfg: Option<f64>,
    pub sampler_name: Option<String>,
    pub scheduler_name: Option<String>,
    #[validate(range(
        min = 0.0,
        max = 1.0,
        message = "Denoising strength must be between 0.0 and 1.0"
    ))]
    pub denoising_strength: Option<f64>,
    pub force_hr_fix: Option<bool>,
    pub subseed: Option<i64>,
    pub subseed_strength: Option<f64>,
    #[serde(rename = "categoryId", alias = "category_id")]
    pub category_id: Option<DbId>,
    pub upscaler_name: Option<String>,
    pub image_enhancements: Option<bool>,
    pub modules: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct Img2ImgRequest {
    /// Only read by the legacy endpoint.
    pub owner_id: Option<OwnerId>,
    pub model_name: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[validate(range(min = 1, message = "steps must be at least 1"))]
    pub steps: Option<u32>,
    pub seed: Option<i64>,
    pub subseed: Option<i64>,
    pub subseed_strength: Option<f64>,
    pub cfg_scale: Option<f64>,
    pub sampler_name: Option<String>,
    pub scheduler_name: Option<String>,
    #[validate(range(
        min = 0.0,
        max = 1.0,
        message = "Denoising strength must be between 0.0 and 1.0"
    ))]
    pub denoising_strength: Option<f64>,
    #[serde(rename = "categoryId", alias = "category_id")]
    pub category_id: Option<DbId>,
    /// Base64 image or a `NAVIGATOR_<job_id>` reference.
    pub init_image: Option<String>,
    pub mask: Option<String>,
    pub image_enhancements: Option<bool>,
}

/// Optional overrides for an HR-fix upscale of a finished image.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpscaleRequest {
    pub upscaler_name: Option<String>,
    #[validate(range(
        min = 0.0,
        max = 1.0,
        message = "Denoising strength must be between 0.0 and 1.0"
    ))]
    pub denoising_strength: Option<f64>,
    #[validate(range(min = 1, message = "hrf_steps must be at least 1"))]
    pub hrf_steps: Option<u32>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn legacy_owner(
    state: &AppState,
    owner_id: Option<OwnerId>,
    replacement: &str,
) -> AppResult<OwnerId> {
    if !state.config.allow_legacy_endpoints {
        return Err(AppError::BadRequest(format!(
            "This endpoint is not enabled. Please use {replacement} instead."
        )));
    }
    owner_id
        .filter(|o| !o.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authentication data".into()))
}

async fn ensure_category_owned(
    state: &AppState,
    category_id: Option<DbId>,
    owner_id: &str,
) -> AppResult<()> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    if !CategoryRepo::is_owned_by(&state.pool, category_id, owner_id).await? {
        return Err(AppError::Core(CoreError::Forbidden(
            "Category does not exist or you do not own it".into(),
        )));
    }
    Ok(())
}

/// Known scheduler name. A case mismatch gets a second, lowercase attempt.
async fn resolve_scheduler(state: &AppState, requested: Option<&str>) -> AppResult<String> {
    let validated = state.resolver.validate_scheduler_name(requested).await?;
    match requested {
        Some(name) if validated != name => {
            tracing::debug!(requested = name, validated = %validated, "Retrying scheduler with lowercase name");
            Ok(state
                .resolver
                .validate_scheduler_name(Some(&name.to_lowercase()))
                .await?)
        }
        _ => Ok(validated),
    }
}

/// Replace a `NAVIGATOR_<job_id>` reference with the stored image data.
async fn resolve_init_image(state: &AppState, init_image: Option<String>) -> AppResult<Option<String>> {
    let Some(image) = init_image else {
        return Ok(None);
    };
    let Some(job_id) = image.strip_prefix(INIT_IMAGE_REFERENCE_PREFIX) else {
        return Ok(Some(image));
    };
    let row = find_finished(state, job_id).await?;
    Ok(row.image_data)
}

/// Allocate the row and queue the task.
async fn submit(state: &AppState, task: Task) -> AppResult<TaskSummary> {
    if state.scheduler.contains(&task.job_id).await
        || state.store.get_image_by_id(&task.job_id).await?.is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job id {} is already in use",
            task.job_id
        ))));
    }

    state
        .store
        .create_job_record(&NewImageRecord {
            job_id: task.job_id.clone(),
            owner_id: task.owner_id.clone(),
            category_id: task.category_id,
        })
        .await?;

    tracing::info!(
        job_id = %task.job_id,
        task_type = task.task_type(),
        origin = %task.origin,
        "Task submitted",
    );
    Ok(state.scheduler.enqueue(task).await)
}

async fn queue_txt2img(
    state: &AppState,
    owner_id: OwnerId,
    origin: String,
    req: Txt2ImgRequest,
    first_pass_image: Option<String>,
) -> AppResult<TaskSummary> {
    req.validate()?;
    let model_name = req.model_name.unwrap_or_default();
    let prompt = req.prompt.unwrap_or_default();
    validate_required_params(&model_name, &prompt)?;
    ensure_category_owned(state, req.category_id, &owner_id).await?;

    let width = req.width.unwrap_or(DEFAULT_WIDTH);
    let height = req.height.unwrap_or(DEFAULT_HEIGHT);
    validate_pixel_count(width, height, state.config.pixel_limit)?;

    let scheduler_name = resolve_scheduler(state, req.scheduler_name.as_deref()).await?;
    let sampler_name = state
        .resolver
        .validate_sampler_name(req.sampler_name.as_deref().unwrap_or(DEFAULT_SAMPLER))
        .await?;
    let upscaler_name = match req.upscaler_name.as_deref() {
        Some(name) => Some(state.resolver.validate_upscaler_name(name).await?),
        None => None,
    };

    let mut params = Txt2ImgParams::new(model_name, prompt);
    params.negative_prompt = req.negative_prompt.unwrap_or_default();
    params.seed = req.seed.unwrap_or(DEFAULT_SEED);
    params.sampler_name = sampler_name;
    params.scheduler_name = scheduler_name;
    params.steps = req.steps.unwrap_or(DEFAULT_STEPS);
    params.hrf_steps = req.hrf_steps.unwrap_or(params.steps);
    params.cfg_scale = req.cfg_scale.unwrap_or(DEFAULT_CFG_SCALE);
    params.distilled_cfg = req.distilled_cfg.unwrap_or(DEFAULT_DISTILLED_CFG);
    params.width = width;
    params.height = height;
    params.denoising_strength = req.denoising_strength.unwrap_or(0.0);
    params.subseed = Subseed::from_parts(req.subseed, req.subseed_strength);
    params.force_hr_fix = req.force_hr_fix.unwrap_or(false);
    params.upscaler_name = upscaler_name;
    params.first_pass_image = first_pass_image;
    params.image_enhancements = req.image_enhancements.unwrap_or(false);
    params.modules = req.modules.unwrap_or_default();

    let job_id = req.job_id.unwrap_or_else(generate_job_id);
    let task = Task::new(job_id, owner_id, origin, TaskKind::Txt2Img(params))
        .with_category(req.category_id);
    submit(state, task).await
}

async fn queue_img2img(
    state: &AppState,
    owner_id: OwnerId,
    origin: String,
    req: Img2ImgRequest,
) -> AppResult<TaskSummary> {
    req.validate()?;
    let model_name = req.model_name.unwrap_or_default();
    let prompt = req.prompt.unwrap_or_default();
    validate_required_params(&model_name, &prompt)?;
    ensure_category_owned(state, req.category_id, &owner_id).await?;

    let width = req.width.unwrap_or(DEFAULT_WIDTH);
    let height = req.height.unwrap_or(DEFAULT_HEIGHT);
    validate_pixel_count(width, height, state.config.pixel_limit)?;

    let known_models = ModelRepo::list_friendly_names(&state.pool).await?;
    let model_name = state
        .resolver
        .validate_model_name(&model_name, &known_models)
        .await?;
    let sampler_name = state
        .resolver
        .validate_sampler_name(req.sampler_name.as_deref().unwrap_or(DEFAULT_SAMPLER))
        .await?;
    let scheduler_name = resolve_scheduler(state, req.scheduler_name.as_deref()).await?;
    let init_image = resolve_init_image(state, req.init_image).await?;

    let mut params = Img2ImgParams::new(model_name, prompt);
    params.negative_prompt = req.negative_prompt.unwrap_or_default();
    params.seed = req.seed.unwrap_or(DEFAULT_SEED);
    params.subseed = Subseed::from_parts(req.subseed, req.subseed_strength);
    params.sampler_name = sampler_name;
    params.scheduler_name = scheduler_name;
    params.steps = req.steps.unwrap_or(DEFAULT_STEPS);
    params.cfg_scale = req.cfg_scale.unwrap_or(DEFAULT_CFG_SCALE);
    params.width = width;
    params.height = height;
    params.denoising_strength = req
        .denoising_strength
        .filter(|d| *d > 0.0)
        .unwrap_or(DEFAULT_IMG2IMG_DENOISING);
    params.init_image = init_image;
    params.mask = req.mask;
    params.image_enhancements = req.image_enhancements.unwrap_or(false);

    let task = Task::new(generate_job_id(), owner_id, origin, TaskKind::Img2Img(params))
        .with_category(req.category_id);
    submit(state, task).await
}

/// Rebuild a txt2img request from a finished image's generation info.
fn upscale_request(
    recovered: RecoveredParams,
    overrides: UpscaleRequest,
    category_id: Option<DbId>,
) -> AppResult<Txt2ImgRequest> {
    let model_name = recovered.model_name.ok_or_else(|| {
        AppError::BadRequest("Could not determine the model used for this image".into())
    })?;
    let steps = (recovered.steps > 0).then_some(recovered.steps);

    Ok(Txt2ImgRequest {
        model_name: Some(model_name),
        prompt: Some(recovered.prompt),
        negative_prompt: Some(recovered.negative_prompt),
        width: Some(recovered.width),
        height: Some(recovered.height),
        steps,
        hrf_steps: overrides.hrf_steps.or(steps),
        seed: Some(recovered.seed),
        cfg_scale: (recovered.cfg_scale > 0.0).then_some(recovered.cfg_scale),
        distilled_cfg: Some(recovered.distilled_cfg),
        sampler_name: recovered.sampler_name,
        scheduler_name: recovered.scheduler_name,
        denoising_strength: overrides.denoising_strength.or(recovered.denoising_strength),
        force_hr_fix: Some(true),
        subseed: recovered.subseed.map(|s| s.seed),
        subseed_strength: recovered.subseed.map(|s| s.strength),
        category_id,
        upscaler_name: overrides.upscaler_name,
        image_enhancements: Some(recovered.image_enhancements),
        modules: Some(recovered.modules),
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// Legacy producers
// ---------------------------------------------------------------------------

/// POST /api/queue/txt2img
pub async fn queue_txt2img_legacy(
    State(state): State<AppState>,
    ClientAddr(origin): ClientAddr,
    Json(req): Json<Txt2ImgRequest>,
) -> AppResult<Json<TaskSummary>> {
    let owner_id = legacy_owner(&state, req.owner_id.clone(), "/api/queue/user/txt2img")?;
    Ok(Json(queue_txt2img(&state, owner_id, origin, req, None).await?))
}

/// POST /api/queue/img2img
pub async fn queue_img2img_legacy(
    State(state): State<AppState>,
    ClientAddr(origin): ClientAddr,
    Json(req): Json<Img2ImgRequest>,
) -> AppResult<Json<TaskSummary>> {
    let owner_id = legacy_owner(&state, req.owner_id.clone(), "/api/queue/user/img2img")?;
    Ok(Json(queue_img2img(&state, owner_id, origin, req).await?))
}

// ---------------------------------------------------------------------------
// Authenticated producers
// ---------------------------------------------------------------------------

/// POST /api/queue/user/txt2img
pub async fn queue_txt2img_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ClientAddr(origin): ClientAddr,
    Json(req): Json<Txt2ImgRequest>,
) -> AppResult<Json<TaskSummary>> {
    Ok(Json(queue_txt2img(&state, auth.owner_id, origin, req, None).await?))
}

/// POST /api/queue/user/img2img
pub async fn queue_img2img_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ClientAddr(origin): ClientAddr,
    Json(req): Json<Img2ImgRequest>,
) -> AppResult<Json<TaskSummary>> {
    Ok(Json(queue_img2img(&state, auth.owner_id, origin, req).await?))
}

/// POST /api/queue/user/txt2img/upscale-hrf/{job_id}
///
/// Re-queue a finished image with HR-fix forced on, using the image itself
/// as the first pass. The result lands in the source image's category when
/// the requester owns it.
pub async fn upscale_hrf(
    auth: AuthUser,
    State(state): State<AppState>,
    ClientAddr(origin): ClientAddr,
    Path(job_id): Path<String>,
    body: Option<Json<UpscaleRequest>>,
) -> AppResult<Json<TaskSummary>> {
    let overrides = body.map(|Json(b)| b).unwrap_or_default();
    overrides.validate()?;

    let row = find_finished(&state, &job_id).await?;
    let category_id = match row.category_id {
        Some(id) if CategoryRepo::is_owned_by(&state.pool, id, &auth.owner_id).await? => Some(id),
        _ => None,
    };

    let info = image_info(&state, &row).await?;
    let recovered = RecoveredParams::from_png_info(&info).ok_or_else(|| {
        AppError::BadRequest("Could not read generation parameters from image".into())
    })?;
    validate_upscale_pixel_count(recovered.width, recovered.height, state.config.pixel_limit)?;

    let req = upscale_request(recovered, overrides, category_id)?;
    tracing::info!(source_job_id = %job_id, "Queueing HR-fix upscale");
    Ok(Json(
        queue_txt2img(&state, auth.owner_id, origin, req, row.image_data).await?,
    ))
}

// ---------------------------------------------------------------------------
// Interrupt
// ---------------------------------------------------------------------------

/// POST /api/queue/interrupt/{job_id}
pub async fn interrupt(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Value>> {
    let body = match state.scheduler.interrupt(&job_id, &auth.owner_id).await? {
        InterruptOutcome::Interrupted => json!({ "message": "Task interrupted!", "status": "interrupted" }),
        InterruptOutcome::Removed => json!({ "message": "Task removed!", "status": "removed" }),
    };
    Ok(Json(body))
}
