//! Source video records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Natural key of a source video (the asset ID assigned at ingestion).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Processing status of a source video.
///
/// `Ready -> Processing -> Completed | Failed`. Failed videos stay failed
/// until an operator resets them to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    /// Waiting for a worker to claim it
    #[default]
    Ready,
    /// Claimed by a worker
    Processing,
    /// All clips materialized
    Completed,
    /// Pipeline fault, see `Video::error`
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Ready => "READY",
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Completed => "COMPLETED",
            VideoStatus::Failed => "FAILED",
        }
    }

    /// Whether a claim cycle has finished for this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READY" => Ok(VideoStatus::Ready),
            "PROCESSING" => Ok(VideoStatus::Processing),
            "COMPLETED" => Ok(VideoStatus::Completed),
            "FAILED" => Ok(VideoStatus::Failed),
            _ => Err(ModelError::InvalidStatus(s.to_string())),
        }
    }
}

/// A source video as stored in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "videoID")]
    pub video_id: VideoId,

    /// Source location handed to the detector and downloader
    pub url: String,

    pub status: VideoStatus,

    /// Last pipeline failure message
    pub error: Option<String>,

    // Descriptive metadata filled in by ingestion.
    pub title: Option<String>,
    pub owner: Option<String>,
    pub resource_name: Option<String>,
    pub file_name: Option<String>,
    pub duration_secs: Option<i64>,
    pub ingest_date: Option<String>,
    pub broadcast_standard: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a READY video with no descriptive metadata.
    pub fn ready(video_id: impl Into<VideoId>, url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            video_id: video_id.into(),
            url: url.into(),
            status: VideoStatus::Ready,
            error: None,
            title: None,
            owner: None,
            resource_name: None,
            file_name: None,
            duration_secs: None,
            ingest_date: None,
            broadcast_standard: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name used for the parent clip in sidecar metadata.
    pub fn display_resource_name(&self) -> &str {
        self.resource_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.video_id.as_str())
    }
}
