//! Review queue handlers: navigate, verdicts, skip, unlock and stats.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use clipqa_models::{Clip, ClipId, Direction, NavigationCursor, ReviewStats, Verdict, Video};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, OptionalJson};
use crate::metrics;
use crate::security::sanitize_text;
use crate::state::AppState;

/// Sent when the requester has nothing left to review.
pub const NO_CLIPS_MESSAGE: &str = "No clips available for QA";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateRequest {
    pub current_id: Option<ClipId>,
    pub direction: Option<String>,
}

impl NavigateRequest {
    fn cursor(&self) -> ApiResult<NavigationCursor> {
        let direction = match self.direction.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Direction>()
                    .map_err(|e| ApiError::bad_request(e.to_string()))?,
            ),
        };
        Ok(NavigationCursor::from_request(self.current_id, direction))
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum NavigateResponse {
    Assigned {
        clip: Clip,
        video: Option<Video>,
        #[serde(rename = "lockExpiresAt")]
        lock_expires_at: DateTime<Utc>,
    },
    Empty {
        clip: Option<Clip>,
        message: &'static str,
    },
}

/// Pick the next clip for the reviewer and lock it.
pub async fn navigate(
    State(state): State<AppState>,
    user: AuthUser,
    OptionalJson(request): OptionalJson<NavigateRequest>,
) -> ApiResult<Json<NavigateResponse>> {
    let cursor = request.cursor()?;
    let now = Utc::now();

    let assignment = state
        .store
        .navigate(cursor, &user.identity, now, &state.lock_policy)
        .await?;

    metrics::record_navigation(assignment.is_some());
    let Some(assignment) = assignment else {
        return Ok(Json(NavigateResponse::Empty {
            clip: None,
            message: NO_CLIPS_MESSAGE,
        }));
    };

    info!(
        clip_id = %assignment.clip.id,
        reviewer = %user.identity,
        "Clip locked for review"
    );

    let locked_at = assignment.clip.qa_locked_at.unwrap_or(now);
    Ok(Json(NavigateResponse::Assigned {
        lock_expires_at: state.lock_policy.expires_at(locked_at),
        clip: assignment.clip,
        video: assignment.video,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaRequest {
    pub is_passed: bool,
    pub comment: Option<String>,
}

/// Record a pass/fail verdict.
pub async fn submit_qa(
    State(state): State<AppState>,
    user: AuthUser,
    Path(clip_id): Path<ClipId>,
    ApiJson(request): ApiJson<QaRequest>,
) -> ApiResult<Json<Clip>> {
    let comment = request
        .comment
        .as_deref()
        .map(sanitize_text)
        .filter(|c| !c.trim().is_empty());

    let clip = state
        .store
        .resolve(
            clip_id,
            Verdict::from_passed(request.is_passed),
            comment,
            &user.identity,
            Utc::now(),
        )
        .await?;

    metrics::record_decision(if request.is_passed { "passed" } else { "failed" });
    info!(clip_id = %clip_id, reviewer = %user.identity, passed = request.is_passed, "Clip reviewed");
    Ok(Json(clip))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipRequest {
    #[serde(default)]
    pub skip_reason: String,
}

/// Take a clip out of the queue with a reason.
pub async fn skip_clip(
    State(state): State<AppState>,
    user: AuthUser,
    Path(clip_id): Path<ClipId>,
    ApiJson(request): ApiJson<SkipRequest>,
) -> ApiResult<Json<Clip>> {
    let reason = sanitize_text(&request.skip_reason);
    let clip = state
        .store
        .skip(clip_id, &reason, &user.identity, Utc::now())
        .await?;

    metrics::record_decision("skipped");
    info!(clip_id = %clip_id, reviewer = %user.identity, "Clip skipped");
    Ok(Json(clip))
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub success: bool,
}

/// Release the caller's lock. Succeeds even when nothing was held.
pub async fn unlock_clip(
    State(state): State<AppState>,
    user: AuthUser,
    Path(clip_id): Path<ClipId>,
) -> ApiResult<Json<UnlockResponse>> {
    let released = state.store.unlock(clip_id, &user.identity, Utc::now()).await?;
    if released {
        info!(clip_id = %clip_id, reviewer = %user.identity, "Clip unlocked");
    }
    Ok(Json(UnlockResponse { success: true }))
}

/// Aggregate review counters.
pub async fn review_stats(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<ReviewStats>> {
    let stats = state.store.stats(Utc::now(), &state.lock_policy).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_needs_both_fields() {
        let request = NavigateRequest {
            current_id: Some(ClipId(5)),
            direction: None,
        };
        assert_eq!(request.cursor().unwrap(), NavigationCursor::First);

        let request = NavigateRequest {
            current_id: None,
            direction: Some("next".into()),
        };
        assert_eq!(request.cursor().unwrap(), NavigationCursor::First);

        let request = NavigateRequest {
            current_id: Some(ClipId(5)),
            direction: Some("prev".into()),
        };
        assert_eq!(request.cursor().unwrap(), NavigationCursor::Before(ClipId(5)));
    }

    #[test]
    fn test_unknown_direction_rejected() {
        let request = NavigateRequest {
            current_id: Some(ClipId(5)),
            direction: Some("sideways".into()),
        };
        assert!(matches!(request.cursor(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_current_id_accepts_string_or_number() {
        let a: NavigateRequest = serde_json::from_str(r#"{"currentId":"42","direction":"next"}"#).unwrap();
        let b: NavigateRequest = serde_json::from_str(r#"{"currentId":42,"direction":"next"}"#).unwrap();
        assert_eq!(a.current_id, Some(ClipId(42)));
        assert_eq!(b.current_id, Some(ClipId(42)));
    }

    #[test]
    fn test_empty_response_shape() {
        let body = serde_json::to_value(NavigateResponse::Empty {
            clip: None,
            message: NO_CLIPS_MESSAGE,
        })
        .unwrap();
        assert_eq!(body["clip"], serde_json::Value::Null);
        assert_eq!(body["message"], NO_CLIPS_MESSAGE);
    }
}
