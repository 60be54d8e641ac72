//! Runtime configuration.
//!
//! Built once at startup from defaults, `.env`, the process environment and
//! CLI overrides, then passed explicitly to every component. Nothing here is
//! global state: tests build their own `AppConfig` pointing at a temp folder.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Origin allowed by CORS when FRONTEND_ORIGIN is not set (Vite dev server)
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5173";

/// Downloader binary used when YTDL_BIN is not set
pub const DEFAULT_YTDL_BIN: &str = "yt-dlp";

/// Default log file
pub const DEFAULT_LOG_FILE: &str = "mediadrop.log";

/// Download configuration
pub mod download {
    use super::Duration;

    /// Deadline for a blocking `POST /download` run (in seconds)
    pub const BATCH_TIMEOUT_SECS: u64 = 300;

    /// Deadline for a streamed `GET /download/stream` run (in seconds)
    pub const STREAM_TIMEOUT_SECS: u64 = 300;

    /// Capacity of the relay → transport event channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 32;

    /// Batch run deadline
    pub fn batch_timeout() -> Duration {
        Duration::from_secs(BATCH_TIMEOUT_SECS)
    }

    /// Streaming run deadline
    pub fn stream_timeout() -> Duration {
        Duration::from_secs(STREAM_TIMEOUT_SECS)
    }
}

/// Metadata (`-J`) configuration
pub mod metadata {
    use super::Duration;

    /// Deadline for a metadata lookup (in seconds)
    pub const TIMEOUT_SECS: u64 = 15;

    /// Metadata lookup deadline
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Cleanup configuration
pub mod cleanup {
    use super::Duration;

    /// Interval between retention sweeps (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 3600;

    /// Sweep interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set to something that doesn't parse
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the server needs to know at runtime.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Folder the downloader writes into and files are served from
    pub download_dir: PathBuf,
    /// Single origin allowed by CORS
    pub frontend_origin: String,
    /// Downloader binary (name on PATH or absolute path)
    pub ytdl_bin: String,
    /// Deadline for batch downloads
    pub download_timeout: Duration,
    /// Deadline for streamed downloads
    pub stream_timeout: Duration,
    /// Deadline for metadata lookups and the version probe
    pub metadata_timeout: Duration,
    /// Files older than this are swept from the download folder; `None` disables
    pub retention: Option<Duration>,
    /// Log file path
    pub log_file: PathBuf,
    /// Minimum level written to console and file
    pub log_level: log::LevelFilter,
}

impl AppConfig {
    /// Defaults with the given download folder. Used by tests and as the base
    /// that the environment is layered onto.
    pub fn with_download_dir(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            download_dir: download_dir.into(),
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
            ytdl_bin: DEFAULT_YTDL_BIN.to_string(),
            download_timeout: download::batch_timeout(),
            stream_timeout: download::stream_timeout(),
            metadata_timeout: metadata::timeout(),
            retention: None,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_level: log::LevelFilter::Info,
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let download_dir = match get("DOWNLOAD_FOLDER") {
            Some(dir) => PathBuf::from(shellexpand::tilde(&dir).into_owned()),
            None => default_download_folder(),
        };
        let mut config = Self::with_download_dir(download_dir);

        let ip: IpAddr = parse_or(get("BIND_ADDR"), "BIND_ADDR", config.bind_addr.ip())?;
        let port: u16 = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        config.bind_addr = SocketAddr::new(ip, port);

        if let Some(origin) = get("FRONTEND_ORIGIN") {
            config.frontend_origin = origin;
        }
        if let Some(bin) = get("YTDL_BIN") {
            config.ytdl_bin = bin;
        }

        config.download_timeout = secs_or(get("DOWNLOAD_TIMEOUT_SECS"), "DOWNLOAD_TIMEOUT_SECS", config.download_timeout)?;
        config.stream_timeout = secs_or(get("STREAM_TIMEOUT_SECS"), "STREAM_TIMEOUT_SECS", config.stream_timeout)?;
        config.metadata_timeout = secs_or(get("METADATA_TIMEOUT_SECS"), "METADATA_TIMEOUT_SECS", config.metadata_timeout)?;

        let retention_hours: u64 = parse_or(get("FILE_RETENTION_HOURS"), "FILE_RETENTION_HOURS", 0)?;
        config.retention = (retention_hours > 0).then(|| Duration::from_secs(retention_hours * 3600));

        if let Some(path) = get("LOG_FILE_PATH") {
            config.log_file = PathBuf::from(shellexpand::tilde(&path).into_owned());
        }
        config.log_level = parse_or(get("LOG_LEVEL"), "LOG_LEVEL", config.log_level)?;

        Ok(config)
    }

    /// Creates the download folder if it doesn't exist yet.
    pub fn ensure_download_dir(&self) -> std::io::Result<()> {
        if !self.download_dir.is_dir() {
            log::info!("Creating download folder {}", self.download_dir.display());
            std::fs::create_dir_all(&self.download_dir)?;
        }
        Ok(())
    }
}

/// The user's conventional download folder.
///
/// Uses the platform lookup first and falls back to `~/Downloads`.
pub fn default_download_folder() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from(shellexpand::tilde("~/Downloads").into_owned()))
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value: raw,
        }),
    }
}

fn secs_or(value: Option<String>, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(value, key, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
