//! yt-dlp format selection.
//!
//! Pure functions mapping (kind, resolution, container) onto the `-f`
//! mini-language. yt-dlp tries `/`-separated alternatives left to right, so
//! the most specific constraint always comes first.

use crate::download::request::DownloadKind;

/// Best audio stream, falling back to the best combined stream.
/// Transcoded to [`AUDIO_CODEC`] at [`AUDIO_QUALITY`] by `--extract-audio`.
pub const AUDIO_SELECTOR: &str = "bestaudio/best";

/// Output codec for audio extraction
pub const AUDIO_CODEC: &str = "mp3";

/// Output bitrate for audio extraction
pub const AUDIO_QUALITY: &str = "192K";

/// Unconstrained best video + audio
pub const DEFAULT_VIDEO_SELECTOR: &str = "bestvideo+bestaudio/best";

/// Containers the client may ask for. Anything else means "no preference".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Webm,
    Mkv,
    Avi,
    Mov,
    Flv,
    ThreeGp,
}

impl Container {
    /// Parses a container name. `best`, empty and unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp4" => Some(Container::Mp4),
            "webm" => Some(Container::Webm),
            "mkv" => Some(Container::Mkv),
            "avi" => Some(Container::Avi),
            "mov" => Some(Container::Mov),
            "flv" => Some(Container::Flv),
            "3gp" => Some(Container::ThreeGp),
            _ => None,
        }
    }

    pub fn ext(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Mkv => "mkv",
            Container::Avi => "avi",
            Container::Mov => "mov",
            Container::Flv => "flv",
            Container::ThreeGp => "3gp",
        }
    }
}

/// Parses a height cap: "720" or "720p". Anything else is ignored.
pub fn parse_height(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value.strip_suffix(['p', 'P']).unwrap_or(value);
    match digits.parse::<u32>() {
        Ok(height) if height > 0 => Some(height),
        _ => {
            if !value.is_empty() {
                log::warn!("Ignoring unusable resolution '{}'", value);
            }
            None
        }
    }
}

/// `bestvideo{filters}+bestaudio/best{filters}`
fn video_audio_pair(filters: &str) -> String {
    format!("bestvideo{filters}+bestaudio/best{filters}")
}

/// Video selector for an optional height cap and container preference.
///
/// ```
/// use mediadrop::download::format::video_selector;
///
/// assert_eq!(video_selector(None, None), "bestvideo+bestaudio/best");
/// assert_eq!(video_selector(Some("720"), None), "bestvideo[height<=720]+bestaudio/best[height<=720]");
/// assert_eq!(video_selector(None, Some("best")), "bestvideo+bestaudio/best");
/// ```
pub fn video_selector(resolution: Option<&str>, container: Option<&str>) -> String {
    let height = resolution.and_then(parse_height);
    let container = container.and_then(Container::parse);

    match (height, container) {
        (Some(h), Some(c)) => {
            let height_filter = format!("[height<={h}]");
            let exact = video_audio_pair(&format!("{height_filter}[ext={}]", c.ext()));
            let any_container = video_audio_pair(&height_filter);
            format!("{exact}/{any_container}")
        }
        (Some(h), None) => video_audio_pair(&format!("[height<={h}]")),
        (None, Some(c)) => video_audio_pair(&format!("[ext={}]", c.ext())),
        (None, None) => DEFAULT_VIDEO_SELECTOR.to_string(),
    }
}

/// Full `-f` value for a request.
pub fn format_selector(kind: DownloadKind, resolution: Option<&str>, container: Option<&str>) -> String {
    match kind {
        DownloadKind::Audio => AUDIO_SELECTOR.to_string(),
        DownloadKind::Video => video_selector(resolution, container),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_audio_ignores_video_options() {
        assert_eq!(format_selector(DownloadKind::Audio, None, None), "bestaudio/best");
        assert_eq!(
            format_selector(DownloadKind::Audio, Some("1080"), Some("mp4")),
            "bestaudio/best"
        );
    }

    #[test]
    fn test_resolution_and_container() {
        assert_eq!(
            video_selector(Some("720"), Some("mp4")),
            "bestvideo[height<=720][ext=mp4]+bestaudio/best[height<=720][ext=mp4]/\
             bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
        assert_eq!(
            video_selector(Some("1080p"), Some("webm")),
            "bestvideo[height<=1080][ext=webm]+bestaudio/best[height<=1080][ext=webm]/\
             bestvideo[height<=1080]+bestaudio/best[height<=1080]"
        );
    }

    #[test]
    fn test_resolution_only() {
        assert_eq!(
            video_selector(Some("480"), None),
            "bestvideo[height<=480]+bestaudio/best[height<=480]"
        );
    }

    #[test]
    fn test_container_only() {
        assert_eq!(
            video_selector(None, Some("mkv")),
            "bestvideo[ext=mkv]+bestaudio/best[ext=mkv]"
        );
        assert_eq!(
            video_selector(None, Some("3gp")),
            "bestvideo[ext=3gp]+bestaudio/best[ext=3gp]"
        );
    }

    #[test]
    fn test_best_is_same_as_unset() {
        assert_eq!(video_selector(None, Some("best")), video_selector(None, None));
        assert_eq!(video_selector(Some("720"), Some("best")), video_selector(Some("720"), None));
    }

    #[test]
    fn test_unknown_container_falls_back_to_any() {
        assert_eq!(video_selector(None, Some("xyz")), DEFAULT_VIDEO_SELECTOR);
        assert_eq!(video_selector(Some("360"), Some("xyz")), video_selector(Some("360"), None));
    }

    #[test]
    fn test_unusable_resolution_is_ignored() {
        assert_eq!(video_selector(Some("high"), None), DEFAULT_VIDEO_SELECTOR);
        assert_eq!(video_selector(Some("0"), Some("mp4")), video_selector(None, Some("mp4")));
        assert_eq!(parse_height("720p"), Some(720));
        assert_eq!(parse_height(" 1440 "), Some(1440));
        assert_eq!(parse_height(""), None);
    }

    #[test]
    fn test_selector_is_deterministic() {
        let resolutions = [None, Some("360"), Some("720"), Some("1080")];
        let containers = [None, Some("best"), Some("mp4"), Some("webm"), Some("mkv"), Some("avi")];

        for resolution in resolutions {
            for container in containers {
                let first = format_selector(DownloadKind::Video, resolution, container);
                for _ in 0..3 {
                    assert_eq!(format_selector(DownloadKind::Video, resolution, container), first);
                }
                // The most specific alternative always leads
                if let (Some(r), Some(c)) = (resolution, container.and_then(Container::parse)) {
                    assert!(first.starts_with(&format!("bestvideo[height<={r}][ext={}]", c.ext())));
                }
            }
        }
    }
}
