//! HTTP surface.
//!
//! Routes:
//! - `GET  /`                 health check
//! - `POST /download`         blocking download, JSON result
//! - `GET  /download/stream`  streamed download, SSE progress
//! - `POST /thumbnail`        thumbnail URL lookup
//! - `GET  /files`            download folder listing
//! - `GET  /files/:filename`  file retrieval

pub mod handlers;
pub mod sse;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::core::config::{AppConfig, ConfigError};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

/// Single-origin CORS policy: GET and POST, `Content-Type`, credentials allowed.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let origin = HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
        key: "FRONTEND_ORIGIN",
        value: origin.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// Build the application router.
pub fn create_router(config: Arc<AppConfig>) -> Result<Router, ConfigError> {
    let cors = cors_layer(&config.frontend_origin)?;
    let state = AppState { config };

    Ok(Router::new()
        .route("/", get(handlers::health))
        .route("/download", post(handlers::download))
        .route("/download/stream", get(handlers::download_stream))
        .route("/thumbnail", post(handlers::thumbnail))
        .route("/files", get(handlers::list_files))
        .route("/files/:filename", get(handlers::serve_file))
        .layer(cors)
        .with_state(state))
}

/// Bind and serve until `shutdown` fires.
pub async fn start_web_server(config: Arc<AppConfig>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = config.bind_addr;
    let app = create_router(config)?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!("Starting web server on http://{}", addr);
    log::info!("  GET  /                 - Health check");
    log::info!("  POST /download         - Download (blocking)");
    log::info!("  GET  /download/stream  - Download with SSE progress");
    log::info!("  POST /thumbnail        - Thumbnail lookup");
    log::info!("  GET  /files            - List downloaded files");
    log::info!("  GET  /files/:filename  - Fetch a downloaded file");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Web server failed")?;

    log::info!("Web server stopped");
    Ok(())
}
