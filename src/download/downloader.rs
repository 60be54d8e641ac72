//! Blocking (batch) downloads: run to completion, then report the new file.

use crate::core::config::AppConfig;
use crate::core::process::run_batch;
use crate::download::error::DownloadError;
use crate::download::files::{file_info, first_finished, FileInfo};
use crate::download::request::DownloadRequest;
use crate::download::snapshot::{diff, DirectorySnapshot};
use crate::download::ytdlp::{build_download_args, RunMode};

/// Result of a successful batch run. `file` is `None` when no new file could
/// be identified or stat'ed; the run itself still succeeded.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub file: Option<FileInfo>,
}

/// Download `request` into the configured folder, bounded by the batch deadline.
pub async fn download_batch(config: &AppConfig, request: &DownloadRequest) -> Result<BatchOutcome, DownloadError> {
    log::info!("Starting download: {} ({})", request.source_url(), request.kind());

    let before = DirectorySnapshot::capture_or_empty(&config.download_dir).await;
    let args = build_download_args(request, &config.download_dir, RunMode::Batch);
    log::debug!("{} {:?}", config.ytdl_bin, args);

    if let Err(e) = run_batch(&config.ytdl_bin, &args, config.download_timeout).await {
        log::error!(
            "Download of {} failed ({}): {}",
            request.source_url(),
            e.subcategory(),
            e
        );
        if let Some(output) = e.output() {
            log::debug!("Downloader output:\n{}", output);
        }
        return Err(e);
    }

    let after = match DirectorySnapshot::capture(&config.download_dir).await {
        Ok(after) => after,
        Err(e) => {
            log::warn!("Error getting file list after download: {}", e);
            return Ok(BatchOutcome::default());
        }
    };

    let Some(name) = first_finished(&diff(&before, &after)) else {
        log::info!("Download of {} finished, but no new file was found", request.source_url());
        return Ok(BatchOutcome::default());
    };

    match file_info(&config.download_dir, &name).await {
        Ok(info) => {
            log::info!("Downloaded {} ({} bytes)", info.name, info.size_bytes);
            Ok(BatchOutcome { file: Some(info) })
        }
        Err(e) => {
            log::warn!("Error getting file info for {}: {}", name, e);
            Ok(BatchOutcome::default())
        }
    }
}
