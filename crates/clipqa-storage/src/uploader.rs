//! The uploader seam used by the clip materializer.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Stored; the link a reviewer can open.
    Uploaded(String),
    /// The local file did not exist, nothing was sent.
    NotFound,
}

impl UploadOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Uploaded(url) => Some(url),
            Self::NotFound => None,
        }
    }
}

/// Stores a local artifact remotely and returns a shareable link.
///
/// `group` collects the artifacts of one video (a key prefix or a folder).
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Short name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    async fn upload(&self, group: &str, local_path: &Path) -> StorageResult<UploadOutcome>;
}

/// Content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// File name component of `path`, or an empty string.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
