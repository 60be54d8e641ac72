//! Progress relay: runs a streamed download and turns it into an ordered
//! sequence of [`ProgressEvent`]s.
//!
//! Lifecycle: `Validating → Spawned → Streaming → Finalizing → Done`.
//! Invalid input is rejected before anything is spawned. Once the process
//! runs, every event goes through a bounded channel; the consumer (the SSE
//! body) cancels the relay by firing the token or dropping the receiver, and
//! the relay then kills the process and stops without emitting anything else.
//!
//! Event order for one run:
//! `Line*`, then `Failed` if the process timed out or failed, then
//! `FileReady` if a new file appeared, then exactly one `Done`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::config::AppConfig;
use crate::core::error::AppError;
use crate::core::process::{RunExit, StreamingProcess};
use crate::core::validation::ValidationError;
use crate::download::error::DownloadError;
use crate::download::files::{first_finished, retrieval_path};
use crate::download::request::{DownloadParams, DownloadRequest};
use crate::download::snapshot::{diff, DirectorySnapshot};
use crate::download::ytdlp::{build_download_args, RunMode};

/// Time allowed for delivering the closing events after the process ended.
const FINALIZE_GRACE: Duration = Duration::from_secs(10);

/// One unit of progress delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// One non-empty stderr line, verbatim
    Line(String),
    /// The run timed out or exited non-zero
    Failed(String),
    /// A new file was detected after the run
    FileReady { filename: String, retrieval_path: String },
    /// Terminal event
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Validating,
    Spawned,
    Streaming,
    Finalizing,
    Done,
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// Input rejected before spawning
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// The process could not be started
    #[error(transparent)]
    Start(#[from] DownloadError),

    /// Consumer went away mid-run; the process was killed
    #[error("client disconnected")]
    ClientGone,
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Rejected(e) => AppError::Validation(e),
            RelayError::Start(e) => AppError::Download(e),
            RelayError::ClientGone => AppError::Download(DownloadError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client disconnected",
            ))),
        }
    }
}

/// Summary of a relay run that reached `Done`.
#[derive(Debug)]
pub struct RelayReport {
    /// Number of `Line` events delivered
    pub lines: usize,
    pub exit: RunExit,
    /// File announced with `FileReady`, if any
    pub file: Option<String>,
}

/// A spawned streamed download, ready to be driven by [`ProgressRelay::run`].
pub struct ProgressRelay {
    request: DownloadRequest,
    download_dir: PathBuf,
    before: DirectorySnapshot,
    process: StreamingProcess,
    state: RelayState,
}

impl ProgressRelay {
    /// Validate `params`, snapshot the download folder and spawn the
    /// downloader. Fails without side effects on invalid input.
    pub async fn start(config: &AppConfig, params: DownloadParams) -> Result<Self, RelayError> {
        log::debug!("Relay state: {:?}", RelayState::Validating);
        let request = DownloadRequest::try_from(params)?;

        log::info!("Starting streamed download: {} ({})", request.source_url(), request.kind());

        let before = DirectorySnapshot::capture_or_empty(&config.download_dir).await;
        let args = build_download_args(&request, &config.download_dir, RunMode::Streaming);
        log::debug!("{} {:?}", config.ytdl_bin, args);

        let process = StreamingProcess::spawn(&config.ytdl_bin, &args, config.stream_timeout)?;

        let relay = Self {
            request,
            download_dir: config.download_dir.clone(),
            before,
            process,
            state: RelayState::Spawned,
        };
        log::debug!("Relay state: {:?}", relay.state);
        Ok(relay)
    }

    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    fn advance(&mut self, next: RelayState) {
        log::debug!("Relay state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Drive the run to completion, emitting events into `events`.
    ///
    /// Returns [`RelayError::ClientGone`] if `cancel` fires or the receiver
    /// is dropped; the process is killed and no further events are sent.
    pub async fn run(
        mut self,
        events: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<RelayReport, RelayError> {
        self.advance(RelayState::Streaming);
        let deadline = self.process.deadline();
        let mut lines = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                line = self.process.next_line() => Some(line),
            };

            let line = match next {
                None => return Err(self.abort("client disconnected").await),
                Some(None) => break,
                Some(Some(line)) => line,
            };

            log::debug!("yt-dlp: {}", line);
            if emit(&events, &cancel, deadline, ProgressEvent::Line(line)).await.is_err() {
                return Err(self.abort("client stopped reading").await);
            }
            lines += 1;
        }

        self.advance(RelayState::Finalizing);
        let Self {
            request,
            download_dir,
            before,
            process,
            ..
        } = self;

        // Dropping an unfinished `finish` future drops the child, which kills it
        let exit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            exit = process.finish() => Some(exit),
        };
        let Some(exit) = exit else {
            log::info!("Client disconnected while waiting for {}", request.source_url());
            return Err(RelayError::ClientGone);
        };

        let deadline = Instant::now() + FINALIZE_GRACE;

        if exit.is_success() {
            log::info!("Download finished: {}", request.source_url());
        } else {
            log::warn!("Download of {} ended badly: {}", request.source_url(), exit);
            emit(&events, &cancel, deadline, ProgressEvent::Failed(exit.to_string())).await?;
        }

        let after = DirectorySnapshot::capture_or_empty(&download_dir).await;
        let file = first_finished(&diff(&before, &after));

        match &file {
            Some(name) => {
                log::info!("New file detected: {}", name);
                let event = ProgressEvent::FileReady {
                    filename: name.clone(),
                    retrieval_path: retrieval_path(name),
                };
                emit(&events, &cancel, deadline, event).await?;
            }
            None => log::info!("No new file detected in {}", download_dir.display()),
        }

        emit(&events, &cancel, deadline, ProgressEvent::Done).await?;
        log::debug!("Relay state: {:?} -> {:?}", RelayState::Finalizing, RelayState::Done);

        Ok(RelayReport { lines, exit, file })
    }

    async fn abort(self, reason: &str) -> RelayError {
        log::info!("Stopping download of {}: {}", self.request.source_url(), reason);
        self.process.kill().await;
        RelayError::ClientGone
    }
}

/// Send one event unless the consumer is gone or stalls past `deadline`.
async fn emit(
    events: &mpsc::Sender<ProgressEvent>,
    cancel: &CancellationToken,
    deadline: Instant,
    event: ProgressEvent,
) -> Result<(), RelayError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RelayError::ClientGone),
        _ = tokio::time::sleep_until(deadline) => Err(RelayError::ClientGone),
        sent = events.send(event) => sent.map_err(|_| RelayError::ClientGone),
    }
}
