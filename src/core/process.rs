//! Process execution utilities with timeout support
//!
//! Two ways of running the external downloader:
//! - [`run_batch`] runs to completion and captures stdout + stderr.
//! - [`StreamingProcess`] hands out stderr line by line while the process is
//!   still running.
//!
//! On unix every child leads its own process group. Timeouts and
//! cancellation kill the whole group, which takes down whatever the
//! downloader started itself (ffmpeg merging or extracting audio).
//! `kill_on_drop(true)` stays as a fallback for the direct child.

use std::collections::VecDeque;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::{timeout, timeout_at, Instant};

use crate::download::error::{format_timeout, DownloadError};

/// Longest stderr line handed out in one piece; longer runs are split.
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Output captured from a batch run.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    /// stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        if !self.stdout.is_empty() && !self.stderr.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

fn base_command(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(program: &str, pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to kill process group of {}: {}", program, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_program: &str, _pid: Option<u32>) {}

fn spawn_error(program: &str, source: std::io::Error) -> DownloadError {
    log::error!("Failed to spawn {}: {}", program, source);
    DownloadError::Spawn {
        program: program.to_string(),
        source,
    }
}

/// Run `program` to completion under `deadline`, capturing its output.
///
/// Non-zero exit is reported as [`DownloadError::ExitFailure`] carrying the
/// combined output; an expired deadline kills the child and returns
/// [`DownloadError::Timeout`].
pub async fn run_batch(program: &str, args: &[String], deadline: Duration) -> Result<CapturedOutput, DownloadError> {
    let child = base_command(program, args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let pid = child.id();

    // Dropping `wait_with_output` on timeout also drops (and kills) the child
    let output = match timeout(deadline, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            kill_process_group(program, pid);
            log::error!("{} timed out after {}, killed", program, format_timeout(&deadline));
            return Err(DownloadError::Timeout { after: deadline });
        }
    };

    let captured = CapturedOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    };

    if output.status.success() {
        Ok(captured)
    } else {
        Err(DownloadError::ExitFailure {
            status: output.status,
            output: captured.combined(),
        })
    }
}

/// How a streamed run ended.
#[derive(Debug)]
pub enum RunExit {
    Success,
    Failed(ExitStatus),
    TimedOut { after: Duration },
    /// Waiting on the child failed; the exit status is unknown
    Lost(String),
}

impl RunExit {
    pub fn is_success(&self) -> bool {
        matches!(self, RunExit::Success)
    }
}

impl fmt::Display for RunExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunExit::Success => write!(f, "completed"),
            RunExit::Failed(status) => write!(f, "downloader exited with {}", status),
            RunExit::TimedOut { after } => write!(f, "download timed out after {}", format_timeout(after)),
            RunExit::Lost(err) => write!(f, "lost track of downloader: {}", err),
        }
    }
}

/// A running process whose stderr is consumed line by line.
///
/// stdout is discarded. Lines are split on `\n` and `\r` (progress bars
/// redraw with carriage returns); empty lines are dropped. A line longer than
/// 16 KiB comes out in several pieces.
pub struct StreamingProcess {
    program: String,
    child: Child,
    pid: Option<u32>,
    stderr: BufReader<ChildStderr>,
    pending: VecDeque<String>,
    buf: Vec<u8>,
    timeout: Duration,
    deadline: Instant,
    timed_out: bool,
}

impl StreamingProcess {
    /// Start `program`. Returns as soon as the process is running.
    pub fn spawn(program: &str, args: &[String], timeout: Duration) -> Result<Self, DownloadError> {
        let mut child = base_command(program, args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        let stderr = child.stderr.take().ok_or_else(|| {
            DownloadError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stderr was not captured"))
        })?;

        let pid = child.id();
        log::debug!("Spawned {} (pid {:?})", program, pid);

        Ok(Self {
            program: program.to_string(),
            child,
            pid,
            stderr: BufReader::new(stderr),
            pending: VecDeque::new(),
            buf: Vec::with_capacity(256),
            timeout,
            deadline: Instant::now() + timeout,
            timed_out: false,
        })
    }

    /// Point in time at which the process gets killed.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Next non-empty stderr line, or `None` once stderr is closed or the
    /// deadline passed (in which case the process has been killed).
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }
            if self.timed_out {
                return None;
            }

            self.buf.clear();
            let mut limited = (&mut self.stderr).take(MAX_LINE_BYTES as u64);
            match timeout_at(self.deadline, limited.read_until(b'\n', &mut self.buf)).await {
                Ok(Ok(0)) => return None,
                Ok(Ok(_)) => {
                    let chunk = String::from_utf8_lossy(&self.buf);
                    self.pending.extend(split_output_lines(&chunk));
                }
                Ok(Err(e)) => {
                    log::warn!("Failed to read {} stderr: {}", self.program, e);
                    return None;
                }
                Err(_) => {
                    self.expire().await;
                    return None;
                }
            }
        }
    }

    /// Wait for the process to exit, still bounded by the deadline.
    pub async fn finish(mut self) -> RunExit {
        if self.timed_out {
            return RunExit::TimedOut { after: self.timeout };
        }

        match timeout_at(self.deadline, self.child.wait()).await {
            Ok(Ok(status)) if status.success() => RunExit::Success,
            Ok(Ok(status)) => RunExit::Failed(status),
            Ok(Err(e)) => RunExit::Lost(e.to_string()),
            Err(_) => {
                self.expire().await;
                RunExit::TimedOut { after: self.timeout }
            }
        }
    }

    /// Kill the process and its children right away (client went away).
    pub async fn kill(mut self) {
        self.kill_all().await;
    }

    async fn expire(&mut self) {
        self.timed_out = true;
        log::error!("{} timed out after {}, killing", self.program, format_timeout(&self.timeout));
        self.kill_all().await;
    }

    /// Kill the group, then the direct child, and reap it.
    async fn kill_all(&mut self) {
        kill_process_group(&self.program, self.pid);
        if let Err(e) = self.child.kill().await {
            log::warn!("Failed to kill {}: {}", self.program, e);
        }
    }
}

/// Split a raw output chunk into relayable lines.
pub fn split_output_lines(chunk: &str) -> impl Iterator<Item = String> + '_ {
    chunk
        .split(['\n', '\r'])
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}
