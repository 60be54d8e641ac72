//! Download request model.
//!
//! [`DownloadParams`] is what arrives over HTTP (JSON body or query string);
//! [`DownloadRequest`] is the validated, immutable form every downloader path
//! works with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::validation::{validate_url, ValidationError};

/// What the client wants out of the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Video,
    Audio,
}

impl DownloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::Video => "video",
            DownloadKind::Audio => "audio",
        }
    }
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(DownloadKind::Video),
            "audio" => Ok(DownloadKind::Audio),
            other => Err(ValidationError::InvalidKind(other.to_string())),
        }
    }
}

/// Raw request parameters, shared by `POST /download` (JSON) and
/// `GET /download/stream` (query string).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    pub url: Option<String>,
    /// "video" or "audio"
    pub format: Option<String>,
    /// Height cap, e.g. "720"
    pub resolution: Option<String>,
    /// Container, e.g. "mp4", "webm", "best"
    pub video_format: Option<String>,
}

/// A validated download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    source_url: String,
    kind: DownloadKind,
    resolution: Option<String>,
    container_format: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl DownloadRequest {
    /// Validate URL and kind. Optional fields are kept as given (trimmed,
    /// empty strings treated as unset); the format selector interprets them.
    pub fn new(
        source_url: &str,
        kind: &str,
        resolution: Option<String>,
        container_format: Option<String>,
    ) -> Result<Self, ValidationError> {
        let source_url = source_url.trim();
        validate_url(source_url)?;
        let kind = kind.trim().parse::<DownloadKind>()?;

        Ok(Self {
            source_url: source_url.to_string(),
            kind,
            resolution: non_empty(resolution),
            container_format: non_empty(container_format),
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn kind(&self) -> DownloadKind {
        self.kind
    }

    pub fn resolution(&self) -> Option<&str> {
        self.resolution.as_deref()
    }

    pub fn container_format(&self) -> Option<&str> {
        self.container_format.as_deref()
    }
}

impl TryFrom<DownloadParams> for DownloadRequest {
    type Error = ValidationError;

    fn try_from(params: DownloadParams) -> Result<Self, Self::Error> {
        let url = non_empty(params.url).ok_or(ValidationError::MissingField("url"))?;
        let kind = non_empty(params.format).ok_or(ValidationError::MissingField("format"))?;
        Self::new(&url, &kind, params.resolution, params.video_format)
    }
}
