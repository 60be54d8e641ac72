//! Directory snapshots.
//!
//! The downloader picks its own output file name from the media title, so the
//! file it produced is found by listing the folder before and after the run.
//! This is racy when two downloads share one folder: either request may see
//! the other's output.

use std::collections::HashSet;
use std::io;
use std::path::Path;

/// Names of the non-directory entries of a folder at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    names: Vec<String>,
}

impl DirectorySnapshot {
    /// Build a snapshot from known names (sorted, deduplicated).
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    /// List `dir`. Directories are skipped, as are names that aren't UTF-8
    /// (they couldn't be served back by name anyway).
    pub async fn capture(dir: &Path) -> io::Result<Self> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    log::debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if file_type.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => log::warn!("Skipping non UTF-8 file name {:?}", raw),
            }
        }

        Ok(Self::from_names(names))
    }

    /// Like [`capture`](Self::capture), but a read failure is logged and
    /// yields an empty snapshot. A broken listing must not abort a download.
    pub async fn capture_or_empty(dir: &Path) -> Self {
        match Self::capture(dir).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Error getting file list for {}: {}", dir.display(), e);
                Self::default()
            }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }
}

/// Entries present in `after` but not in `before`, in `after`'s order.
pub fn diff(before: &DirectorySnapshot, after: &DirectorySnapshot) -> Vec<String> {
    let seen: HashSet<&str> = before.names.iter().map(String::as_str).collect();
    after
        .names
        .iter()
        .filter(|name| !seen.contains(name.as_str()))
        .cloned()
        .collect()
}
