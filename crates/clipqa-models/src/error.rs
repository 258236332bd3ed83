//! Model parsing errors.

use thiserror::Error;

/// Result type for model conversions.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing persisted or wire representations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid clip ID: {0}")]
    InvalidClipId(String),

    #[error("Invalid video status: {0}")]
    InvalidStatus(String),

    #[error("Invalid navigation direction: {0}")]
    InvalidDirection(String),
}
