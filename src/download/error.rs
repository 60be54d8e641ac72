use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Structured error type for downloader process operations.
///
/// Categorized so the HTTP layer can pick a status and message, and so logs
/// carry a stable subcategory.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The downloader binary could not be spawned at all
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process was still running at the deadline and was killed
    #[error("process timed out after {}", format_timeout(.after))]
    Timeout { after: Duration },

    /// The process ran to completion with a non-zero exit status
    #[error("process exited with {status}")]
    ExitFailure { status: ExitStatus, output: String },

    /// Metadata document was missing, unparsable or lacked the wanted field
    #[error("{0}")]
    Metadata(String),

    /// Waiting on or reading from the process failed
    #[error("process I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Spawn { .. } => "spawn",
            DownloadError::Timeout { .. } => "timeout",
            DownloadError::ExitFailure { .. } => "exit_failure",
            DownloadError::Metadata(_) => "metadata",
            DownloadError::Io(_) => "io",
        }
    }

    /// Captured process output, when the error carries any
    pub fn output(&self) -> Option<&str> {
        match self {
            DownloadError::ExitFailure { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// `300s` for whole seconds, `1500ms` otherwise.
pub fn format_timeout(after: &Duration) -> String {
    if after.subsec_nanos() == 0 {
        format!("{}s", after.as_secs())
    } else {
        format!("{}ms", after.as_millis().max(1))
    }
}
