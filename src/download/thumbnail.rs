//! Thumbnail lookup via the downloader's JSON metadata dump.

use serde::Deserialize;

use crate::core::config::AppConfig;
use crate::core::error::AppResult;
use crate::core::process::run_batch;
use crate::core::validation::validate_url;
use crate::download::error::DownloadError;
use crate::download::ytdlp::build_metadata_args;

/// The only part of the `-J` document we care about.
#[derive(Debug, Deserialize)]
struct VideoMetadata {
    #[serde(default)]
    thumbnail: Option<String>,
}

/// Pulls the thumbnail URL out of a `-J` document.
pub fn extract_thumbnail(json: &[u8]) -> Result<String, DownloadError> {
    let metadata: VideoMetadata = serde_json::from_slice(json).map_err(|e| {
        log::warn!("Failed to parse video info: {}", e);
        DownloadError::Metadata("Failed to parse video info".to_string())
    })?;

    metadata
        .thumbnail
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DownloadError::Metadata("Thumbnail not found".to_string()))
}

/// Fetch the thumbnail URL for `url`, bounded by the metadata deadline.
pub async fn fetch_thumbnail(config: &AppConfig, url: &str) -> AppResult<String> {
    let url = url.trim();
    validate_url(url)?;

    log::info!("Fetching thumbnail for {}", url);
    let output = run_batch(&config.ytdl_bin, &build_metadata_args(url), config.metadata_timeout)
        .await
        .map_err(|e| {
            log::error!("Metadata lookup for {} failed ({}): {}", url, e.subcategory(), e);
            match e {
                DownloadError::ExitFailure { .. } => DownloadError::Metadata("Failed to fetch video info".to_string()),
                other => other,
            }
        })?;

    Ok(extract_thumbnail(&output.stdout)?)
}
