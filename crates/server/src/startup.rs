use std::net::SocketAddr;

use axum::Router;
use configs::{AppConfig, ServerConfig};
use service::{runtime, storage::{DocumentStore, FsDocumentStore}};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes::{self, ServerState, UploadLimits};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", server.host, server.port).parse()?)
}

/// Prepare directories, open the store and build the router from `config`.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    runtime::ensure_env(&config.frontend.dir, &config.storage.root).await?;

    let store: Arc<dyn DocumentStore> = FsDocumentStore::new(&config.storage.root).await?;
    let state = ServerState {
        store,
        limits: UploadLimits { max_bytes: config.upload.max_bytes },
    };
    crate::metrics::register_all();

    Ok(routes::build_router(state, build_cors(), &config.frontend.dir))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(event = "shutdown_signal", "received Ctrl+C, draining connections");
    }
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&config).await?;

    let addr = bind_addr(&config.server)?;
    info!(
        %addr,
        storage_root = %config.storage.root.display(),
        max_upload_bytes = config.upload.max_bytes,
        "starting geojson server"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
