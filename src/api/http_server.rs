use axum::{
    extract::{DefaultBodyLimit, State},
    http::Uri,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::classify::classify_handler;
use super::errors::ApiError;
use super::models::models_handler;
use crate::version;
use crate::vision::ClassificationService;

/// Router-level body cap: the 10MB image plus multipart overhead
pub const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: ClassificationService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: ClassificationService) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models_loaded: Vec<String>,
    pub background_removal: bool,
    pub uptime_seconds: u64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Classification; the Next.js proxy calls the path without a slash
        .route("/api/classify/", post(classify_handler))
        .route("/api/classify", post(classify_handler))
        // Model catalog
        .route("/api/models/", get(models_handler))
        .route("/api/models", get(models_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::VERSION_NUMBER.to_string(),
        models_loaded: state.service.loader().loaded_keys(),
        background_removal: state.service.has_background_removal(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
