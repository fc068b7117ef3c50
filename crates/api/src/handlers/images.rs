//! Retrieval of finished images, their generation info, and live previews.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use navigator_core::error::CoreError;
use navigator_core::store::StoredImage;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clients match on the bare "Image not found" text, so the id is left out.
fn not_found(entity: &'static str, job_id: &str) -> AppError {
    tracing::debug!(job_id, entity, "Lookup missed");
    AppError::Core(CoreError::NotFound {
        entity,
        id: String::new(),
    })
}

/// Clients link to `/images/<id>.png`; the extension is not part of the id.
fn strip_png(job_id: &str) -> &str {
    job_id.strip_suffix(".png").unwrap_or(job_id)
}

/// Decode stored base64 PNG data into an `image/png` response.
fn png_response(data: &str) -> AppResult<Response> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::InternalError(format!("Stored image is not valid base64: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

/// Fetch a row that already has its final image.
pub(crate) async fn find_finished(state: &AppState, job_id: &str) -> AppResult<StoredImage> {
    state
        .store
        .get_image_by_id(job_id)
        .await?
        .filter(|row| row.image_data.is_some())
        .ok_or_else(|| not_found("Image", job_id))
}

/// Generation info for a finished image.
///
/// Served from the cache when present; otherwise read from the backend,
/// tagged with the owner, and cached.
pub(crate) async fn image_info(state: &AppState, row: &StoredImage) -> AppResult<Value> {
    if let Some(cached) = state.store.get_image_metadata(&row.job_id).await? {
        return Ok(cached);
    }

    let data = row
        .image_data
        .as_deref()
        .ok_or_else(|| not_found("Image", &row.job_id))?;
    let mut info = state.forge.png_info(data).await?;
    if let Some(params) = info.get_mut("parameters").and_then(Value::as_object_mut) {
        params.insert("owner_id".into(), Value::String(row.owner_id.clone()));
    }

    if let Err(e) = state.store.set_image_metadata(&row.job_id, &info).await {
        tracing::warn!(job_id = %row.job_id, error = %e, "Failed to update image info cache");
    }
    Ok(info)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/images/{job_id}
pub async fn get_image(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let row = find_finished(&state, strip_png(&job_id)).await?;
    png_response(row.image_data.as_deref().unwrap_or_default())
}

/// GET /api/images/{job_id}/info
pub async fn get_image_info(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Value>> {
    let row = find_finished(&state, strip_png(&job_id)).await?;
    Ok(Json(image_info(&state, &row).await?))
}

/// GET /api/previews/{job_id}
pub async fn get_preview(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let job_id = strip_png(&job_id);
    let preview = state
        .store
        .get_image_by_id(job_id)
        .await?
        .and_then(|row| row.preview_data)
        .ok_or_else(|| not_found("Preview", job_id))?;
    png_response(&preview)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_suffix_is_ignored() {
        assert_eq!(strip_png("ab12cd34.png"), "ab12cd34");
        assert_eq!(strip_png("ab12cd34"), "ab12cd34");
    }

    #[test]
    fn invalid_base64_is_an_internal_error() {
        assert!(matches!(png_response("***"), Err(AppError::InternalError(_))));
    }

    #[test]
    fn png_response_decodes() {
        let resp = png_response("iVBORw0KGgo=").unwrap();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    }
}
