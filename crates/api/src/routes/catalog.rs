use axum::routing::get;
use axum::Router;

use crate::handlers::catalog;
use crate::state::AppState;

/// Catalog routes, merged at the `/api` root.
///
/// ```text
/// GET /models        -> list_models
/// GET /samplers      -> list_samplers
/// GET /upscalers     -> list_upscalers
/// GET /schedulers    -> list_schedulers
/// GET /modules       -> list_modules
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/models", get(catalog::list_models))
        .route("/samplers", get(catalog::list_samplers))
        .route("/upscalers", get(catalog::list_upscalers))
        .route("/schedulers", get(catalog::list_schedulers))
        .route("/modules", get(catalog::list_modules))
}
