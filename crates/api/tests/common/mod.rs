use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use navigator_core::store::ImageStore;
use navigator_events::{EventBus, NotificationSink};
use navigator_forge::{ForgeApi, GenerationBackend, ParameterResolver};
use navigator_pipeline::{JobScheduler, Pipeline, PipelineConfig};

use navigator_api::auth::jwt::{generate_access_token, JwtConfig};
use navigator_api::config::ServerConfig;
use navigator_api::router::build_app_router;
use navigator_api::state::AppState;
use navigator_api::ws::WsManager;

pub const TEST_JWT_SECRET: &str = "navigator-test-secret";

pub const SAMPLERS: &str = r#"[
    {"name": "DPM++ 2M", "aliases": ["k_dpmpp_2m"]},
    {"name": "Euler a", "aliases": ["k_euler_a"]}
]"#;

pub const SCHEDULERS: &str = r#"[
    {"name": "automatic", "label": "Automatic"},
    {"name": "karras", "label": "Karras"}
]"#;

pub const UPSCALERS: &str = r#"[
    {"name": "None"},
    {"name": "4x_NMKD-Siax_200k"},
    {"name": "RealESRGAN_x4"}
]"#;

pub const SD_MODELS: &str = r#"[
    {"title": "flux-dev [abc]", "model_name": "flux-dev"},
    {"title": "sdxl [def]", "model_name": "sdxl"}
]"#;

/// Build a test `ServerConfig` with safe defaults, pointing at `forge_url`.
pub fn test_config(forge_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: navigator_api::config::DEFAULT_MAX_BODY_BYTES,
        database_url: String::new(),
        forge_url: forge_url.to_string(),
        pixel_limit: 1024 * 1024,
        progress_interval: Duration::from_millis(50),
        checkpoint_unload_after: None,
        allow_legacy_endpoints: false,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 5,
        },
    }
}

/// The router plus the handles tests inspect. No worker runs, so queued
/// tasks stay queued.
pub struct TestApp {
    pub router: Router,
    pub scheduler: Arc<JobScheduler>,
    pub store: Arc<dyn ImageStore>,
    pub event_bus: Arc<EventBus>,
    pub config: ServerConfig,
}

pub fn build_test_app(pool: PgPool, config: ServerConfig) -> TestApp {
    let forge = Arc::new(ForgeApi::new(config.forge_url.clone()));
    let backend: Arc<dyn GenerationBackend> = forge.clone();
    let resolver = Arc::new(ParameterResolver::new(Arc::clone(&backend)));
    let event_bus = Arc::new(EventBus::default());
    let store: Arc<dyn ImageStore> = Arc::new(navigator_db::PgImageStore::new(pool.clone()));
    let sink: Arc<dyn NotificationSink> = event_bus.clone();

    let pipeline = Pipeline::with_resolver(
        backend,
        Arc::clone(&resolver),
        Arc::clone(&store),
        sink,
        PipelineConfig::default(),
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        forge,
        resolver,
        scheduler: Arc::clone(&pipeline.scheduler),
        store: Arc::clone(&store),
        event_bus: Arc::clone(&event_bus),
        ws_manager: Arc::new(WsManager::new()),
    };

    TestApp {
        router: build_app_router(state, &config),
        scheduler: pipeline.scheduler,
        store,
        event_bus,
        config,
    }
}

/// Mock the catalog endpoints the producers consult.
pub async fn mock_catalogs(server: &mut mockito::Server) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    for (path, body) in [
        ("/sdapi/v1/samplers", SAMPLERS),
        ("/sdapi/v1/schedulers", SCHEDULERS),
        ("/sdapi/v1/upscalers", UPSCALERS),
        ("/sdapi/v1/sd-models", SD_MODELS),
    ] {
        mocks.push(
            server
                .mock("GET", path)
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(body)
                .create_async()
                .await,
        );
    }
    mocks
}

pub fn bearer(owner_id: &str) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 5,
    };
    let token = generate_access_token(owner_id, &config).unwrap();
    format!("Bearer {token}")
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.0.0.7");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
