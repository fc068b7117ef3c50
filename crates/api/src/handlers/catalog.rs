//! Passthrough of the backend's catalogs.
//!
//! These endpoints are public: bots use them for auto-complete lists.

use axum::extract::{Query, State};
use axum::Json;
use navigator_core::job_events::EVENT_MODELS_REFRESHED;
use navigator_db::repositories::ModelRepo;
use navigator_events::NotificationSink;
use navigator_forge::models::{Sampler, Scheduler, SdModule, Upscaler};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

/// Samplers returned when the caller does not ask for `all`. Discord caps
/// auto-complete lists at 25 entries.
pub const DEFAULT_SAMPLER_LIMIT: usize = 24;

/// The backend lists a pseudo-upscaler with this name.
const NO_UPSCALER: &str = "None";

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SamplersQuery {
    pub all: Option<String>,
}

/// GET /api/models
///
/// Backend checkpoints merged with the locally known models table. With
/// `?refresh=true` the backend re-scans its checkpoint directory first and
/// every client is told about it.
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> AppResult<Json<Value>> {
    if query.refresh.as_deref() == Some("true") {
        state.forge.refresh_checkpoints().await?;
        tracing::info!("Backend checkpoints refreshed");
        state.event_bus.broadcast(
            EVENT_MODELS_REFRESHED,
            json!({ "message": "Models have been refreshed!" }),
        );
    }

    let backend_models = state.resolver.models().await?;
    let known = ModelRepo::list(&state.pool).await?;

    let models: Vec<Value> = backend_models
        .into_iter()
        .map(|model| {
            let matched = known.iter().find(|k| k.model_name == model.model_name);
            let mut entry = json!(model);
            if let Some(obj) = entry.as_object_mut() {
                obj.insert("known".into(), json!(matched.is_some()));
                if let Some(k) = matched {
                    obj.insert("friendly_name".into(), json!(k.friendly_name));
                    obj.insert("description".into(), json!(k.description));
                }
            }
            entry
        })
        .collect();

    Ok(Json(json!({ "models": models })))
}

/// GET /api/samplers
pub async fn list_samplers(
    State(state): State<AppState>,
    Query(query): Query<SamplersQuery>,
) -> AppResult<Json<Vec<Sampler>>> {
    let mut samplers = state.forge.samplers().await?;
    if query.all.is_none() {
        samplers.truncate(DEFAULT_SAMPLER_LIMIT);
    }
    Ok(Json(samplers))
}

/// GET /api/upscalers
pub async fn list_upscalers(State(state): State<AppState>) -> AppResult<Json<Vec<Upscaler>>> {
    let upscalers = state
        .forge
        .upscalers()
        .await?
        .into_iter()
        .filter(|u| u.name != NO_UPSCALER)
        .collect();
    Ok(Json(upscalers))
}

/// GET /api/schedulers
pub async fn list_schedulers(State(state): State<AppState>) -> AppResult<Json<Vec<Scheduler>>> {
    Ok(Json(state.forge.schedulers().await?))
}

/// GET /api/modules
pub async fn list_modules(State(state): State<AppState>) -> AppResult<Json<Vec<SdModule>>> {
    Ok(Json(state.forge.sd_modules().await?))
}
