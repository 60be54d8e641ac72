//! Download management: request model, format selection, yt-dlp invocation,
//! progress relay and the download folder.

pub mod downloader;
pub mod error;
pub mod files;
pub mod format;
pub mod relay;
pub mod request;
pub mod snapshot;
pub mod thumbnail;
pub mod ytdlp;

// Re-exports for convenience
pub use downloader::{download_batch, BatchOutcome};
pub use error::DownloadError;
pub use files::{FileInfo, MediaType};
pub use relay::{ProgressEvent, ProgressRelay, RelayError, RelayReport};
pub use request::{DownloadKind, DownloadParams, DownloadRequest};
pub use snapshot::DirectorySnapshot;
