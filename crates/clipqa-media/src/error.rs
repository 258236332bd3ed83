use std::path::PathBuf;

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Failures while fetching, cutting or inspecting video files.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg binary is not installed")]
    FfmpegNotFound,

    #[error("ffprobe binary is not installed")]
    FfprobeNotFound,

    #[error("ffmpeg: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffprobe: {message}")]
    FfprobeFailed { message: String, stderr: Option<String> },

    #[error("source download: {message}")]
    DownloadFailed { message: String },

    #[error("clip range {start_ms}ms..{end_ms}ms is empty")]
    InvalidRange { start_ms: i64, end_ms: i64 },

    #[error("no such file {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("media tool exceeded its {0}s limit")]
    Timeout(u64),

    #[error("unreadable media: {0}")]
    InvalidVideo(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    JsonParse(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed { message: message.into() }
    }

    /// Captured tool stderr, if the failure came from ffmpeg or ffprobe.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::FfmpegFailed { stderr, .. } | Self::FfprobeFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_only_for_tool_failures() {
        let err = MediaError::ffmpeg_failed("exit 1", Some("moov atom not found".into()), Some(1));
        assert_eq!(err.stderr(), Some("moov atom not found"));
        assert_eq!(MediaError::download_failed("404").stderr(), None);
    }

    #[test]
    fn test_messages_name_the_range() {
        let err = MediaError::InvalidRange { start_ms: 5_000, end_ms: 5_000 };
        assert_eq!(err.to_string(), "clip range 5000ms..5000ms is empty");
    }
}
