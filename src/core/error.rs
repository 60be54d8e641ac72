use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::validation::ValidationError;
use crate::download::error::{format_timeout, DownloadError};

/// Maximum number of bytes of captured downloader output echoed back to the client.
const DETAILS_TAIL_BYTES: usize = 4000;

/// Centralized error types for the application
///
/// All request-level failures are converted to this enum, which knows how to
/// render itself as an HTTP response.
///
/// # Example
///
/// ```no_run
/// use mediadrop::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Input rejected before any subprocess work (400)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Requested file does not exist in the download folder (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Downloader process errors (500)
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// IO errors (500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Download(_) | AppError::Io(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal errors are summarised, not echoed.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::NotFound(what) => format!("{} not found", what),
            AppError::Download(DownloadError::Spawn { .. }) => "Failed to start download".to_string(),
            AppError::Download(DownloadError::Timeout { after }) => {
                format!("Download timed out after {}", format_timeout(after))
            }
            AppError::Download(DownloadError::Metadata(msg)) => msg.clone(),
            AppError::Download(_) => "Download failed".to_string(),
            AppError::Io(_) | AppError::Config(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }

        let mut body = json!({ "error": self.public_message() });
        if let AppError::Download(DownloadError::ExitFailure { output, .. }) = &self {
            body["details"] = json!(truncate_tail_utf8(output, DETAILS_TAIL_BYTES));
        }

        (status, Json(body)).into_response()
    }
}

/// Keeps the last `max_bytes` of `text`, cutting on a char boundary.
pub fn truncate_tail_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
