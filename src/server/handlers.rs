//! Route handlers.

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::sse::event_stream;
use super::AppState;
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::validation::{sanitize_file_name, ValidationError};
use crate::download::downloader::download_batch;
use crate::download::files::{self, content_type_for};
use crate::download::relay::ProgressRelay;
use crate::download::request::{DownloadParams, DownloadRequest};
use crate::download::thumbnail::fetch_thumbnail;

fn malformed(rejection: impl std::fmt::Display) -> AppError {
    AppError::Validation(ValidationError::MalformedRequest(rejection.to_string()))
}

/// GET /: health check.
pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": 200,
        "message": "The server was successfully connected",
    }))
}

/// POST /download: run a download to completion.
pub async fn download(
    State(state): State<AppState>,
    body: Result<Json<DownloadParams>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(params) = body.map_err(malformed)?;
    let request = DownloadRequest::try_from(params)?;

    let outcome = download_batch(&state.config, &request).await?;

    let mut response = json!({ "message": "Download completed" });
    if let Some(file) = outcome.file {
        response["filename"] = json!(file.name);
        response["size"] = json!(file.size_bytes);
        response["downloadUrl"] = json!(file.retrieval_path);
    }
    Ok(Json(response))
}

/// GET /download/stream: run a download, relaying progress as SSE.
///
/// Input is validated and the process spawned before the response starts,
/// so bad input is a 400 and a missing binary a 500.
pub async fn download_stream(
    State(state): State<AppState>,
    query: Result<Query<DownloadParams>, QueryRejection>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Query(params) = query.map_err(malformed)?;
    let relay = ProgressRelay::start(&state.config, params).await?;
    let url = relay.request().source_url().to_string();

    let (tx, rx) = mpsc::channel(config::download::EVENT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let relay_cancel = cancel.clone();

    tokio::spawn(async move {
        match relay.run(tx, relay_cancel).await {
            Ok(report) => log::info!(
                "Streamed download of {} done: {} progress line(s), {}, file: {}",
                url,
                report.lines,
                report.exit,
                report.file.as_deref().unwrap_or("none")
            ),
            Err(e) => log::info!("Streamed download of {} stopped: {}", url, e),
        }
    });

    Ok(Sse::new(event_stream(rx, cancel.drop_guard())))
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailParams {
    #[serde(default)]
    pub url: Option<String>,
}

/// POST /thumbnail: thumbnail URL for a video.
pub async fn thumbnail(
    State(state): State<AppState>,
    body: Result<Json<ThumbnailParams>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(params) = body.map_err(malformed)?;
    let url = params.url.unwrap_or_default();

    let thumbnail = fetch_thumbnail(&state.config, &url).await?;
    Ok(Json(json!({ "thumbnail": thumbnail })))
}

/// GET /files: everything in the download folder.
pub async fn list_files(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let files = files::list_files(&state.config.download_dir).await.map_err(|e| {
        log::error!("Failed to read download folder: {}", e);
        AppError::Io(e)
    })?;

    Ok(Json(json!({
        "count": files.len(),
        "files": files,
    })))
}

/// `attachment; filename="<name>"`, with quotes in the name neutralised.
fn content_disposition(name: &str) -> HeaderValue {
    let value = format!("attachment; filename=\"{}\"", name.replace('"', "'"));
    HeaderValue::from_bytes(value.as_bytes()).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// GET /files/:filename: stream one file as an attachment.
///
/// The name is reduced to its last path component, so nothing outside the
/// download folder is reachable.
pub async fn serve_file(State(state): State<AppState>, Path(filename): Path<String>) -> AppResult<Response> {
    let name = sanitize_file_name(&filename)?;
    let path = state.config.download_dir.join(&name);

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("File".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let metadata = file.metadata().await?;
    if metadata.is_dir() {
        return Err(AppError::NotFound("File".to_string()));
    }

    log::info!("Serving {} ({} bytes)", name, metadata.len());

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&name))),
        (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
        (header::CONTENT_DISPOSITION, content_disposition(&name)),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}
