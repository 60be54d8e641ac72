//! Download folder contents: file descriptors, listing, MIME mapping and
//! retention cleanup.

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config;

/// Route prefix files are served under.
pub const FILES_ROUTE_PREFIX: &str = "/files/";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "ogv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"];

/// Coarse media classification by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Unknown,
}

/// Lowercased extension of `name`, if any.
fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Classifies a file name by extension (case-insensitive).
pub fn media_type_for(name: &str) -> MediaType {
    match extension(name) {
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaType::Video,
        Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => MediaType::Audio,
        _ => MediaType::Unknown,
    }
}

/// MIME type sent with a served file.
pub fn content_type_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("webm") => "video/webm",
        Some("3gp") => "video/3gpp",
        Some("ogv") => "video/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("aac") | Some("m4a") => "audio/aac",
        Some("ogg") => "audio/ogg",
        Some("wma") => "audio/x-ms-wma",
        _ => "application/octet-stream",
    }
}

/// `/files/<percent-encoded name>`
pub fn retrieval_path(name: &str) -> String {
    format!("{}{}", FILES_ROUTE_PREFIX, urlencoding::encode(name))
}

/// yt-dlp leftovers that are never the finished download.
pub fn is_partial_artifact(name: &str) -> bool {
    name.starts_with('.') || [".part", ".ytdl", ".temp"].iter().any(|suffix| name.ends_with(suffix))
}

/// First finished file among `candidates`.
pub fn first_finished<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    candidates
        .into_iter()
        .find(|name| !is_partial_artifact(name))
        .cloned()
}

/// Modification time as RFC 3339 in local time.
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Descriptor of one file in the download folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "modTime")]
    pub modified: String,
    #[serde(rename = "downloadUrl")]
    pub retrieval_path: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

impl FileInfo {
    fn from_metadata(name: String, metadata: &std::fs::Metadata) -> Self {
        let modified = metadata
            .modified()
            .map(format_timestamp)
            .unwrap_or_default();

        Self {
            retrieval_path: retrieval_path(&name),
            media_type: media_type_for(&name),
            size_bytes: metadata.len(),
            modified,
            name,
        }
    }
}

/// Stat `dir/name` and describe it.
pub async fn file_info(dir: &Path, name: &str) -> io::Result<FileInfo> {
    let metadata = tokio::fs::metadata(dir.join(name)).await?;
    Ok(FileInfo::from_metadata(name.to_string(), &metadata))
}

/// Describe every non-directory entry of `dir`, sorted by name.
///
/// Entries that vanish or can't be stat'ed mid-listing are skipped.
pub async fn list_files(dir: &Path) -> io::Result<Vec<FileInfo>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if metadata.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        files.push(FileInfo::from_metadata(name, &metadata));
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Delete non-directory entries of `dir` modified more than `max_age` ago.
///
/// Per-file failures are logged and skipped. Returns the number removed.
pub async fn cleanup_old_files(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let cutoff = SystemTime::now().checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path: PathBuf = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", path.display(), e);
                continue;
            }
        };
        if metadata.is_dir() {
            continue;
        }
        let is_old = metadata.modified().map(|t| t < cutoff).unwrap_or(false);
        if !is_old {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::info!("Removed old file {}", path.display());
                removed += 1;
            }
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}

/// Sweep `dir` every hour until `shutdown` fires.
pub fn start_cleanup_task(dir: PathBuf, max_age: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = config::cleanup::sweep_interval();
        log::info!(
            "🧹 Retention sweep started (every {}s, max age {}h)",
            interval.as_secs(),
            max_age.as_secs() / 3600
        );

        loop {
            match cleanup_old_files(&dir, max_age).await {
                Ok(0) => log::debug!("Retention sweep: nothing to remove"),
                Ok(n) => log::info!("Retention sweep removed {} file(s)", n),
                Err(e) => log::warn!("Retention sweep of {} failed: {}", dir.display(), e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("Retention sweep stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("clip.mp4"), MediaType::Video);
        assert_eq!(media_type_for("CLIP.MKV"), MediaType::Video);
        assert_eq!(media_type_for("song.m4a"), MediaType::Audio);
        assert_eq!(media_type_for("song.Mp3"), MediaType::Audio);
        assert_eq!(media_type_for("notes.txt"), MediaType::Unknown);
        assert_eq!(media_type_for("README"), MediaType::Unknown);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.mp4"), "video/mp4");
        assert_eq!(content_type_for("a.m4v"), "video/mp4");
        assert_eq!(content_type_for("a.mov"), "video/quicktime");
        assert_eq!(content_type_for("a.3gp"), "video/3gpp");
        assert_eq!(content_type_for("a.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("a.m4a"), "audio/aac");
        assert_eq!(content_type_for("a.wma"), "audio/x-ms-wma");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_retrieval_path_is_encoded() {
        assert_eq!(retrieval_path("video.mp4"), "/files/video.mp4");
        assert_eq!(retrieval_path("My Song #1.mp3"), "/files/My%20Song%20%231.mp3");
    }

    #[test]
    fn test_partial_artifacts() {
        assert!(is_partial_artifact("clip.mp4.part"));
        assert!(is_partial_artifact("clip.mp4.ytdl"));
        assert!(is_partial_artifact("clip.temp"));
        assert!(is_partial_artifact(".DS_Store"));
        assert!(!is_partial_artifact("clip.mp4"));

        let names = vec!["a.mp4.part".to_string(), "a.mp4".to_string()];
        assert_eq!(first_finished(&names), Some("a.mp4".to_string()));
        assert_eq!(first_finished(&names[..1]), None);
    }

    #[test]
    fn test_file_info_serializes_wire_names() {
        let info = FileInfo {
            name: "a.mp4".into(),
            size_bytes: 3,
            modified: "2024-01-01T00:00:00Z".into(),
            retrieval_path: "/files/a.mp4".into(),
            media_type: MediaType::Video,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "a.mp4",
                "size": 3,
                "modTime": "2024-01-01T00:00:00Z",
                "downloadUrl": "/files/a.mp4",
                "type": "video"
            })
        );
    }

    #[tokio::test]
    async fn test_list_files_excludes_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"abc").unwrap();
        std::fs::create_dir(dir.path().join("dir")).unwrap();

        let files = list_files(dir.path()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.mp4");
        assert_eq!(files[0].size_bytes, 3);
        assert_eq!(files[0].media_type, MediaType::Video);
        assert_eq!(files[1].name, "b.txt");
        assert_eq!(files[1].media_type, MediaType::Unknown);
        assert!(chrono::DateTime::parse_from_rfc3339(&files[0].modified).is_ok());
    }

    #[tokio::test]
    async fn test_file_info_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_info(dir.path(), "nope.mp4").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cleanup_old_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fresh.mp4"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();

        // Nothing is older than an hour
        assert_eq!(cleanup_old_files(dir.path(), Duration::from_secs(3600)).await.unwrap(), 0);

        // Everything is older than zero seconds, once the clock moves
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cleanup_old_files(dir.path(), Duration::ZERO).await.unwrap(), 1);
        assert!(!dir.path().join("fresh.mp4").exists());
        assert!(dir.path().join("keep").exists());
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        let handle = start_cleanup_task(dir.path().to_path_buf(), Duration::from_secs(3600), shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("cleanup task did not stop")
            .unwrap();
    }
}
