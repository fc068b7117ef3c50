//! Retrieval of stored images, previews and generation info.

mod common;

use axum::http::StatusCode;
use common::{body_bytes, body_json, get};
use mockito::{Matcher, Server};
use navigator_core::store::NewImageRecord;
use serde_json::json;
use sqlx::PgPool;

async fn seed(app: &common::TestApp, job_id: &str) {
    app.store
        .create_job_record(&NewImageRecord {
            job_id: job_id.into(),
            owner_id: "alice".into(),
            category_id: None,
        })
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn image_is_served_as_png(pool: PgPool) {
    let app = common::build_test_app(pool, common::test_config("http://127.0.0.1:9"));
    seed(&app, "img00001").await;
    app.store.write_final_image("img00001", "RklOQUw=").await.unwrap();

    let response = get(app.router.clone(), "/api/images/img00001").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(response).await, b"FINAL");

    let with_ext = get(app.router, "/api/images/img00001.png").await;
    assert_eq!(with_ext.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unfinished_image_is_404(pool: PgPool) {
    let app = common::build_test_app(pool, common::test_config("http://127.0.0.1:9"));
    seed(&app, "img00002").await;

    let response = get(app.router, "/api/images/img00002").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Image not found");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn preview_is_served_until_missing(pool: PgPool) {
    let app = common::build_test_app(pool, common::test_config("http://127.0.0.1:9"));
    seed(&app, "img00003").await;

    let missing = get(app.router.clone(), "/api/previews/img00003").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.store.write_preview("img00003", "UFJFVklFVw==").await.unwrap();
    let response = get(app.router, "/api/previews/img00003.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"PREVIEW");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn info_is_fetched_once_then_cached(pool: PgPool) {
    let mut server = Server::new_async().await;
    let png_info = server
        .mock("POST", "/sdapi/v1/png-info")
        .match_body(Matcher::PartialJson(json!({"image": "RklOQUw="})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"info": "Steps: 20, Model: flux-dev", "parameters": {"Steps": 20}}"#)
        .expect(1)
        .create_async()
        .await;
    let app = common::build_test_app(pool, common::test_config(&server.url()));
    seed(&app, "img00004").await;
    app.store.write_final_image("img00004", "RklOQUw=").await.unwrap();

    let first = body_json(get(app.router.clone(), "/api/images/img00004/info").await).await;
    assert_eq!(first["parameters"]["owner_id"], "alice");
    assert_eq!(first["parameters"]["Steps"], 20);

    let second = body_json(get(app.router, "/api/images/img00004/info").await).await;
    assert_eq!(second, first);
    png_info.assert_async().await;
}
