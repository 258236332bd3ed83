//! Operator routes.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use tracing::info;

use clipqa_models::{Video, VideoId};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_video_id;
use crate::state::AppState;

/// Put a FAILED video back in the work queue.
pub async fn reset_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Video>> {
    user.require_admin()?;

    if !is_valid_video_id(&video_id) {
        return Err(ApiError::bad_request("Invalid video ID format"));
    }

    let video = state
        .store
        .reset_failed(&VideoId::from(video_id), Utc::now())
        .await?;

    info!(video_id = %video.video_id, admin = %user.identity, "Video reset to READY");
    Ok(Json(video))
}
