//! Name normalisation against the backend's catalogs.
//!
//! Samplers, schedulers and upscalers rarely change, so each list is cached
//! after the first successful fetch for the lifetime of the process.
//! Checkpoints are fetched fresh on every lookup because they can be added
//! at any time.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::ForgeApiError;
use crate::backend::GenerationBackend;
use crate::models::{Sampler, Scheduler, SdModel, Upscaler};

/// Scheduler used when none is requested or the requested one is unknown.
pub const DEFAULT_SCHEDULER: &str = "automatic";

/// Preferred upscaler when the requested one is unknown.
pub const PREFERRED_UPSCALER: &str = "4x_NMKD-Siax_200k";

/// Last-resort upscaler, assumed to ship with every backend.
pub const FALLBACK_UPSCALER: &str = "RealESRGAN_x4";

pub struct ParameterResolver {
    backend: Arc<dyn GenerationBackend>,
    samplers: RwLock<Option<Arc<Vec<Sampler>>>>,
    schedulers: RwLock<Option<Arc<Vec<Scheduler>>>>,
    upscalers: RwLock<Option<Arc<Vec<Upscaler>>>>,
}

impl ParameterResolver {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            samplers: RwLock::new(None),
            schedulers: RwLock::new(None),
            upscalers: RwLock::new(None),
        }
    }

    // ---- cached catalogs ----

    pub async fn samplers(&self) -> Result<Arc<Vec<Sampler>>, ForgeApiError> {
        if let Some(cached) = self.samplers.read().await.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let fetched = Arc::new(self.backend.samplers().await?);
        *self.samplers.write().await = Some(Arc::clone(&fetched));
        tracing::debug!(count = fetched.len(), "Sampler cache updated");
        Ok(fetched)
    }

    pub async fn schedulers(&self) -> Result<Arc<Vec<Scheduler>>, ForgeApiError> {
        if let Some(cached) = self.schedulers.read().await.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let fetched = Arc::new(self.backend.schedulers().await?);
        *self.schedulers.write().await = Some(Arc::clone(&fetched));
        tracing::debug!(count = fetched.len(), "Scheduler cache updated");
        Ok(fetched)
    }

    pub async fn upscalers(&self) -> Result<Arc<Vec<Upscaler>>, ForgeApiError> {
        if let Some(cached) = self.upscalers.read().await.as_ref() {
            return Ok(Arc::clone(cached));
        }
        let fetched = Arc::new(self.backend.upscalers().await?);
        *self.upscalers.write().await = Some(Arc::clone(&fetched));
        tracing::debug!(count = fetched.len(), "Upscaler cache updated");
        Ok(fetched)
    }

    /// Checkpoints, always fetched fresh.
    pub async fn models(&self) -> Result<Vec<SdModel>, ForgeApiError> {
        self.backend.sd_models().await
    }

    // ---- validation ----

    /// Exact name, then alias, then the first sampler the backend lists.
    pub async fn validate_sampler_name(&self, name: &str) -> Result<String, ForgeApiError> {
        let samplers = self.samplers().await?;
        if let Some(sampler) = samplers
            .iter()
            .find(|s| s.name == name || s.aliases.iter().any(|a| a == name))
        {
            return Ok(sampler.name.clone());
        }
        samplers
            .first()
            .map(|s| s.name.clone())
            .ok_or(ForgeApiError::EmptyCatalog("samplers"))
    }

    /// Known scheduler name, or `"automatic"`. `None` never hits the backend.
    pub async fn validate_scheduler_name(
        &self,
        name: Option<&str>,
    ) -> Result<String, ForgeApiError> {
        let Some(name) = name else {
            return Ok(DEFAULT_SCHEDULER.to_string());
        };
        let schedulers = self.schedulers().await?;
        if schedulers.iter().any(|s| s.name == name) {
            return Ok(name.to_string());
        }
        Ok(DEFAULT_SCHEDULER.to_string())
    }

    /// Known upscaler name, else the preferred upscaler if installed (and
    /// not the name that was just rejected), else the fallback.
    pub async fn validate_upscaler_name(&self, name: &str) -> Result<String, ForgeApiError> {
        let upscalers = self.upscalers().await?;
        if upscalers.iter().any(|u| u.name == name) {
            return Ok(name.to_string());
        }
        if name != PREFERRED_UPSCALER && upscalers.iter().any(|u| u.name == PREFERRED_UPSCALER) {
            return Ok(PREFERRED_UPSCALER.to_string());
        }
        Ok(FALLBACK_UPSCALER.to_string())
    }

    /// Backend checkpoint, then a locally known friendly name, else the
    /// first checkpoint the backend lists.
    pub async fn validate_model_name(
        &self,
        name: &str,
        known_models: &[String],
    ) -> Result<String, ForgeApiError> {
        let models = self.models().await?;
        if models.iter().any(|m| m.model_name == name) || known_models.iter().any(|k| k == name) {
            return Ok(name.to_string());
        }
        models
            .first()
            .map(|m| m.model_name.clone())
            .ok_or(ForgeApiError::EmptyCatalog("models"))
    }
}
