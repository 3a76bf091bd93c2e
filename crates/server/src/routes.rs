use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;
use service::storage::DocumentStore;

use crate::{metrics, openapi::ApiDoc};

pub mod geojson;

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_ENVELOPE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

/// Shared, immutable per-process state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<dyn DocumentStore>,
    pub limits: UploadLimits,
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { ok: true })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router: API, health, metrics and the viewer's static assets.
pub fn build_router(state: ServerState, cors: CorsLayer, frontend_dir: &Path) -> Router {
    let static_dir = ServeDir::new(frontend_dir).fallback(ServeFile::new(frontend_dir.join("index.html")));
    let body_limit = DefaultBodyLimit::max(state.limits.max_bytes.saturating_add(MULTIPART_ENVELOPE_BYTES));

    let api = Router::new()
        .route("/api/geojson", post(geojson::upload).layer(body_limit))
        .route("/api/geojson/:id", get(geojson::retrieve))
        .route("/api/openapi.json", get(openapi_json));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(api)
        .fallback_service(static_dir)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                // 5xx 以 ERROR 记录
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
