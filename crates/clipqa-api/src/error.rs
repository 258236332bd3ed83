//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use clipqa_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error code sent when a reviewer acts on a clip someone else holds.
pub const LOCKED_BY_ANOTHER_USER: &str = "locked_by_another_user";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(e) => match e {
                StoreError::LockedByAnotherUser { .. } => StatusCode::FORBIDDEN,
                StoreError::Validation(_) => StatusCode::BAD_REQUEST,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::Store(StoreError::LockedByAnotherUser { .. }) => Some(LOCKED_BY_ANOTHER_USER),
            _ => None,
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal() {
            tracing::error!("Request failed: {}", self);
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipqa_models::ClipId;

    #[test]
    fn test_store_error_status_mapping() {
        let locked = ApiError::from(StoreError::LockedByAnotherUser {
            clip_id: ClipId(7),
            locked_by: "a@example.com".to_string(),
        });
        assert_eq!(locked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(locked.code(), Some(LOCKED_BY_ANOTHER_USER));

        assert_eq!(
            ApiError::from(StoreError::validation("Skip reason is required")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::not_found("clip 9")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert!(ApiError::internal("boom").is_internal());
    }

    #[test]
    fn test_lock_message_does_not_name_holder() {
        let err = ApiError::from(StoreError::LockedByAnotherUser {
            clip_id: ClipId(7),
            locked_by: "a@example.com".to_string(),
        });
        assert!(!err.to_string().contains("a@example.com"));
    }
}
