//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] clipqa_store::StoreError),

    #[error("Detector error: {0}")]
    Detector(#[from] clipqa_detector::DetectorError),

    #[error("Media error: {0}")]
    Media(#[from] clipqa_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] clipqa_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    /// Store connectivity faults. These are retried on the next poll
    /// instead of failing a video.
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkerError::Store(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipqa_store::StoreError;

    #[test]
    fn test_pipeline_faults_are_not_transient() {
        assert!(!WorkerError::processing_failed("boom").is_transient());
        assert!(!WorkerError::from(StoreError::validation("bad")).is_transient());
        assert!(!WorkerError::from(StoreError::not_found("video v1")).is_transient());
    }
}
