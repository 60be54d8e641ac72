//! URL and path validation utilities
//!
//! Provides structural validation for user inputs:
//! - Absolute URL validation (scheme + host, no scheme allow-list)
//! - File name sanitization (reduce to the base component, no traversal)

use std::path::Path;
use thiserror::Error;
use url::Url;

/// Validation errors. All of them map to a 400 response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Missing scheme or host, or the string does not parse at all
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// `format` was something other than `video` or `audio`
    #[error("Invalid format '{0}'. Choose 'video' or 'audio'")]
    InvalidKind(String),

    /// A required field was absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// File name is empty or reduces to nothing after sanitization
    #[error("Invalid file name '{0}'")]
    InvalidFileName(String),

    /// Request body or query string could not be decoded
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

/// Validates that `raw` is an absolute URL with a non-empty scheme and host.
///
/// This is a structural check only: any scheme is accepted (`ftp://` passes).
/// The explicit `scheme://` authority marker is required, so inputs the URL
/// parser would silently repair (`http:/example.com`) are rejected. The same
/// goes for a `%` in the authority or path that does not start a two-digit
/// hex escape (`/%zz`, `/a%2`).
///
/// # Examples
/// ```
/// use mediadrop::core::validation::validate_url;
///
/// assert!(validate_url("https://example.com").is_ok());
/// assert!(validate_url("ftp://example.com").is_ok());
///
/// assert!(validate_url("example.com").is_err()); // no scheme
/// assert!(validate_url("http://").is_err()); // no host
/// assert!(validate_url("https://example.com/%zz").is_err()); // bad escape
/// assert!(validate_url("").is_err());
/// ```
pub fn validate_url(raw: &str) -> Result<Url, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingField("url"));
    }

    let parsed = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl(format!("{} ({})", raw, e)))?;

    let has_authority = raw
        .trim()
        .get(parsed.scheme().len() + 1..)
        .is_some_and(|rest| rest.starts_with("//"));
    if !has_authority {
        return Err(ValidationError::InvalidUrl(format!("{} (no authority)", raw)));
    }

    let before_query = raw.trim().split(['?', '#']).next().unwrap_or_default();
    if has_malformed_escape(before_query) {
        return Err(ValidationError::InvalidUrl(format!("{} (invalid escape)", raw)));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ValidationError::InvalidUrl(format!("{} (no host)", raw))),
    }
}

/// True if some `%` is not followed by two hex digits.
fn has_malformed_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    })
}

/// Boolean form of [`validate_url`].
pub fn is_valid_url(raw: &str) -> bool {
    validate_url(raw).is_ok()
}

/// Reduces a requested file name to its final path component.
///
/// `../../etc/passwd` becomes `passwd`; names with no usable final component
/// (`""`, `..`, `/`) are rejected.
///
/// # Examples
/// ```
/// use mediadrop::core::validation::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("video.mp4").unwrap(), "video.mp4");
/// assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
/// assert!(sanitize_file_name("..").is_err());
/// ```
pub fn sanitize_file_name(name: &str) -> Result<String, ValidationError> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ValidationError::InvalidFileName(name.to_string()))
}
