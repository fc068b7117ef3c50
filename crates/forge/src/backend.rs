//! The seam between the pipeline and the generation backend.
//!
//! [`ForgeApi`] is the only production implementation; the pipeline tests
//! drive a scripted fake through the same trait.

use async_trait::async_trait;

use crate::api::{ForgeApi, ForgeApiError};
use crate::models::{
    ForgeOptions, GenerationResponse, InternalProgress, ProgressResponse, Sampler, Scheduler,
    SdModel, Upscaler,
};
use crate::payload::{Img2ImgPayload, Txt2ImgPayload};

#[async_trait]
pub trait GenerationBackend: Send + Sync + 'static {
    async fn txt2img(&self, payload: &Txt2ImgPayload) -> Result<GenerationResponse, ForgeApiError>;

    async fn img2img(&self, payload: &Img2ImgPayload) -> Result<GenerationResponse, ForgeApiError>;

    async fn progress(&self) -> Result<ProgressResponse, ForgeApiError>;

    /// Whether the backend is working on the task tagged `id_task`.
    async fn internal_progress(&self, id_task: &str) -> Result<InternalProgress, ForgeApiError>;

    async fn interrupt(&self) -> Result<(), ForgeApiError>;

    async fn unload_checkpoint(&self) -> Result<(), ForgeApiError>;

    async fn png_info(&self, image: &str) -> Result<serde_json::Value, ForgeApiError>;

    async fn options(&self) -> Result<ForgeOptions, ForgeApiError>;

    async fn samplers(&self) -> Result<Vec<Sampler>, ForgeApiError>;

    async fn schedulers(&self) -> Result<Vec<Scheduler>, ForgeApiError>;

    async fn upscalers(&self) -> Result<Vec<Upscaler>, ForgeApiError>;

    async fn sd_models(&self) -> Result<Vec<SdModel>, ForgeApiError>;
}

#[async_trait]
impl GenerationBackend for ForgeApi {
    async fn txt2img(&self, payload: &Txt2ImgPayload) -> Result<GenerationResponse, ForgeApiError> {
        ForgeApi::txt2img(self, payload).await
    }

    async fn img2img(&self, payload: &Img2ImgPayload) -> Result<GenerationResponse, ForgeApiError> {
        ForgeApi::img2img(self, payload).await
    }

    async fn progress(&self) -> Result<ProgressResponse, ForgeApiError> {
        ForgeApi::progress(self).await
    }

    async fn internal_progress(&self, id_task: &str) -> Result<InternalProgress, ForgeApiError> {
        ForgeApi::internal_progress(self, id_task).await
    }

    async fn interrupt(&self) -> Result<(), ForgeApiError> {
        ForgeApi::interrupt(self).await
    }

    async fn unload_checkpoint(&self) -> Result<(), ForgeApiError> {
        ForgeApi::unload_checkpoint(self).await
    }

    async fn png_info(&self, image: &str) -> Result<serde_json::Value, ForgeApiError> {
        ForgeApi::png_info(self, image).await
    }

    async fn options(&self) -> Result<ForgeOptions, ForgeApiError> {
        ForgeApi::options(self).await
    }

    async fn samplers(&self) -> Result<Vec<Sampler>, ForgeApiError> {
        ForgeApi::samplers(self).await
    }

    async fn schedulers(&self) -> Result<Vec<Scheduler>, ForgeApiError> {
        ForgeApi::schedulers(self).await
    }

    async fn upscalers(&self) -> Result<Vec<Upscaler>, ForgeApiError> {
        ForgeApi::upscalers(self).await
    }

    async fn sd_models(&self) -> Result<Vec<SdModel>, ForgeApiError> {
        ForgeApi::sd_models(self).await
    }
}
