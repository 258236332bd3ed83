//! Detector client error types.

use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Expected JSON response but got: {0}")]
    NotJson(String),

    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Detector did not return a job id")]
    MissingJobId,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectorError {
    /// Network faults, 5xx and 429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            DetectorError::Network(_) => true,
            DetectorError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
