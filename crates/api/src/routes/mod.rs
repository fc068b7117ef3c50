pub mod catalog;
pub mod health;
pub mod images;
pub mod queue;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                             WebSocket notifications
///
/// /models                                         checkpoints (?refresh=true)
/// /samplers                                       samplers (?all=true)
/// /upscalers                                      upscalers
/// /schedulers                                     schedulers
/// /modules                                        extra modules (VAE / text encoders)
///
/// /queue/txt2img                                  legacy bot producer (POST)
/// /queue/img2img                                  legacy bot producer (POST)
/// /queue/user/txt2img                             txt2img producer (POST, auth)
/// /queue/user/img2img                             img2img producer (POST, auth)
/// /queue/user/txt2img/upscale-hrf/{job_id}        HR-fix upscale (POST, auth)
/// /queue/interrupt/{job_id}                       interrupt or remove (POST, auth)
///
/// /images/{job_id}                                final image (GET)
/// /images/{job_id}/info                           generation info (GET)
/// /previews/{job_id}                              preview image (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_handler))
        // Backend catalogs
        .merge(catalog::router())
        // Producers and interrupt
        .nest("/queue", queue::router())
        // Stored images
        .merge(images::router())
}
