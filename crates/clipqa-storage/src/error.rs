//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during artifact uploads.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }
}
