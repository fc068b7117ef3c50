use axum::routing::get;
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// Image routes, merged at the `/api` root. A trailing `.png` on the id is
/// ignored.
///
/// ```text
/// GET /images/{job_id}         -> get_image
/// GET /images/{job_id}/info    -> get_image_info
/// GET /previews/{job_id}       -> get_preview
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/{job_id}", get(images::get_image))
        .route("/images/{job_id}/info", get(images::get_image_info))
        .route("/previews/{job_id}", get(images::get_preview))
}
