use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use navigator_core::store::ImageStore;
use navigator_events::{EventBus, NotificationSink};
use navigator_forge::{ForgeApi, GenerationBackend, ParameterResolver};
use navigator_pipeline::{Pipeline, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use navigator_api::config::ServerConfig;
use navigator_api::notifications::NotificationRouter;
use navigator_api::router::build_app_router;
use navigator_api::state::AppState;
use navigator_api::ws;

/// How long the notification router may take to drain after the bus closes.
const ROUTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        forge_url = %config.forge_url,
        legacy_endpoints = config.allow_legacy_endpoints,
        progress_interval_ms = config.progress_interval.as_millis() as u64,
        checkpoint_unload_after_secs = config.checkpoint_unload_after.map(|d| d.as_secs()),
        "Loaded server configuration",
    );

    let pool = prepare_database(&config.database_url).await;

    // Forge client shared by the catalog handlers and the pipeline.
    let forge = Arc::new(ForgeApi::new(config.forge_url.clone()));
    let backend: Arc<dyn GenerationBackend> = forge.clone();
    let resolver = Arc::new(ParameterResolver::new(Arc::clone(&backend)));

    let event_bus = Arc::new(EventBus::default());
    let store: Arc<dyn ImageStore> = Arc::new(navigator_db::PgImageStore::new(pool.clone()));
    let sink: Arc<dyn NotificationSink> = event_bus.clone();

    let pipeline = Pipeline::with_resolver(
        Arc::clone(&backend),
        Arc::clone(&resolver),
        Arc::clone(&store),
        sink,
        PipelineConfig {
            progress_interval: config.progress_interval,
            checkpoint_unload_after: config.checkpoint_unload_after,
            ..PipelineConfig::default()
        },
    );
    pipeline.context.sync_model_from_backend(backend.as_ref()).await;

    // One token stops every background task once the listener has closed.
    let shutdown = CancellationToken::new();

    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        ws::HEARTBEAT_INTERVAL,
        shutdown.child_token(),
    );
    let router_handle = tokio::spawn(
        NotificationRouter::new(Arc::clone(&ws_manager)).run(event_bus.subscribe()),
    );

    let worker = pipeline.worker;
    let worker_token = shutdown.child_token();
    let worker_handle = tokio::spawn(async move { worker.run(worker_token).await });
    let unloader_handle = pipeline
        .unloader
        .map(|unloader| unloader.spawn(shutdown.child_token()));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        forge,
        resolver,
        scheduler: Arc::clone(&pipeline.scheduler),
        store,
        event_bus: Arc::clone(&event_bus),
        ws_manager: Arc::clone(&ws_manager),
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Navigator listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    tracing::info!("Listener closed, draining background tasks");

    // The worker lets its running task finish before returning.
    shutdown.cancel();
    let _ = worker_handle.await;
    let _ = heartbeat_handle.await;
    if let Some(handle) = unloader_handle {
        let _ = handle.await;
    }
    tracing::info!("Background tasks stopped");

    // Once the scheduler and bus are gone the router sees a closed channel.
    drop(pipeline.scheduler);
    drop(event_bus);
    if tokio::time::timeout(ROUTER_DRAIN_TIMEOUT, router_handle)
        .await
        .is_err()
    {
        tracing::warn!("Notification router did not drain in time");
    }

    let open = ws_manager.connection_count().await;
    ws_manager.shutdown_all().await;
    tracing::info!(closed_connections = open, "Shutdown complete");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "navigator_api=debug,navigator_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, verify and migrate. Any failure here is fatal at startup.
async fn prepare_database(url: &str) -> navigator_db::DbPool {
    let pool = navigator_db::create_pool(url)
        .await
        .expect("Failed to connect to database");
    navigator_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    navigator_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");
    pool
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested");
}
