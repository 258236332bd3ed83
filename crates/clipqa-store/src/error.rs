//! Record store error types.

use clipqa_models::{ClipId, ModelError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Clip {clip_id} is locked by another user")]
    LockedByAnotherUser { clip_id: ClipId, locked_by: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid stored value: {0}")]
    Decode(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Connection and pool faults that the next poll cycle may not see.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            )
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::LockedByAnotherUser { .. } => "locked",
            StoreError::Validation(_) => "validation",
            StoreError::Decode(_) => "decode",
            StoreError::Database(_) => "database",
            StoreError::Migration(_) => "migration",
        }
    }
}
