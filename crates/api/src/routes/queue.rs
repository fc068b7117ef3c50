use axum::routing::post;
use axum::Router;

use crate::handlers::queue;
use crate::state::AppState;

/// Producer routes mounted at `/queue`.
///
/// ```text
/// POST /txt2img                              -> queue_txt2img_legacy
/// POST /img2img                              -> queue_img2img_legacy
/// POST /user/txt2img                         -> queue_txt2img_user
/// POST /user/img2img                         -> queue_img2img_user
/// POST /user/txt2img/upscale-hrf/{job_id}    -> upscale_hrf
/// POST /interrupt/{job_id}                   -> interrupt
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/txt2img", post(queue::queue_txt2img_legacy))
        .route("/img2img", post(queue::queue_img2img_legacy))
        .route("/user/txt2img", post(queue::queue_txt2img_user))
        .route("/user/img2img", post(queue::queue_img2img_user))
        .route("/user/txt2img/upscale-hrf/{job_id}", post(queue::upscale_hrf))
        .route("/interrupt/{job_id}", post(queue::interrupt))
}
