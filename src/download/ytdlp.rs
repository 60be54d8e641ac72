//! yt-dlp invocation: argument vectors and the version probe.

use std::path::Path;
use std::time::Duration;

use crate::core::process::run_batch;
use crate::download::error::DownloadError;
use crate::download::format::{format_selector, AUDIO_CODEC, AUDIO_QUALITY};
use crate::download::request::{DownloadKind, DownloadRequest};

/// File name template handed to `-o`; yt-dlp substitutes title and extension.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// One progress line per update: percentage and ETA.
pub const PROGRESS_TEMPLATE: &str = "download:%(progress._percent_str)s (%(progress.eta)s remaining)";

/// How the run is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run to completion, output captured
    Batch,
    /// Progress read line by line while running
    Streaming,
}

/// `-o` value for a download folder.
pub fn output_template(download_dir: &Path) -> String {
    download_dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned()
}

/// Arguments for a download run.
///
/// Order: format selection, audio extraction (audio only), common flags,
/// output template, progress flags (streaming only), then the URL last.
pub fn build_download_args(request: &DownloadRequest, download_dir: &Path, mode: RunMode) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        format_selector(request.kind(), request.resolution(), request.container_format()),
    ];

    if request.kind() == DownloadKind::Audio {
        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            AUDIO_CODEC.to_string(),
            "--audio-quality".to_string(),
            AUDIO_QUALITY.to_string(),
        ]);
    }

    args.extend([
        "--no-playlist".to_string(),
        "--prefer-free-formats".to_string(),
        "-o".to_string(),
        output_template(download_dir),
    ]);

    if mode == RunMode::Streaming {
        args.extend([
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
        ]);
    }

    args.push(request.source_url().to_string());
    args
}

/// Arguments for a metadata dump (`-J`) of a single URL.
pub fn build_metadata_args(url: &str) -> Vec<String> {
    vec!["-J".to_string(), url.to_string()]
}

/// Runs `<bin> --version` and returns the trimmed version string.
pub async fn probe_version(ytdl_bin: &str, deadline: Duration) -> Result<String, DownloadError> {
    log::info!("Checking {} version...", ytdl_bin);

    let output = run_batch(ytdl_bin, &["--version".to_string()], deadline).await?;
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();

    if version.is_empty() {
        return Err(DownloadError::Metadata(format!(
            "{} --version produced no output",
            ytdl_bin
        )));
    }

    log::info!("{} version: {}", ytdl_bin, version);
    Ok(version)
}
