//! Common test utilities
//!
//! This module is shared across all integration tests. A [`Sandbox`] is a
//! temp folder holding a download folder and, optionally, a fake downloader:
//! a `/bin/sh` script standing in for yt-dlp.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use mediadrop::core::AppConfig;

/// Prepended to every fake downloader. Sets `$dir` to the folder of the `-o`
/// template and records the argument vector, one per line.
const SCRIPT_PREAMBLE: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
dir=$(dirname "$out")
printf '%s\n' "$@" > "__ARGS_FILE__"
"#;

pub struct Sandbox {
    root: TempDir,
    pub config: AppConfig,
}

impl Sandbox {
    /// Empty download folder, downloader pointing nowhere.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let download_dir = root.path().join("downloads");
        fs::create_dir(&download_dir).expect("create download dir");

        let mut config = AppConfig::with_download_dir(download_dir);
        config.ytdl_bin = root.path().join("missing-yt-dlp").to_string_lossy().into_owned();
        config.stream_timeout = Duration::from_secs(10);
        config.download_timeout = Duration::from_secs(10);
        config.metadata_timeout = Duration::from_secs(10);

        Self { root, config }
    }

    /// Sandbox whose downloader runs `body` after the preamble.
    pub fn with_downloader(body: &str) -> Self {
        let mut sandbox = Self::new();
        let script = sandbox.root.path().join("yt-dlp");
        let preamble = SCRIPT_PREAMBLE.replace("__ARGS_FILE__", &sandbox.args_file().to_string_lossy());
        write_executable(&script, &format!("{preamble}{body}\n"));
        sandbox.config.ytdl_bin = script.to_string_lossy().into_owned();
        sandbox
    }

    pub fn download_dir(&self) -> &Path {
        &self.config.download_dir
    }

    /// Put a file into the download folder.
    pub fn add_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.download_dir().join(name);
        fs::write(&path, contents).expect("write file");
        path
    }

    fn args_file(&self) -> PathBuf {
        self.root.path().join("args.txt")
    }

    /// Arguments the fake downloader was last invoked with.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.args_file())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(unix)]
fn write_executable(path: &Path, contents: &str) {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    {
        let mut file = fs::File::create(path).expect("create script");
        file.write_all(contents.as_bytes()).expect("write script");
        file.sync_all().expect("sync script");
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
}

#[cfg(not(unix))]
fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write script");
}

/// Downloader that reports 50% and 100%, then writes `video.mp4`.
pub const HAPPY_VIDEO: &str = r#"echo "50%" >&2
echo "100%" >&2
printf 'video-bytes' > "$dir/video.mp4""#;
