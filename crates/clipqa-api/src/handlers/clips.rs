//! Clip listing.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use clipqa_models::VideoId;
use clipqa_store::{ClipFilter, ClipPage, DecisionFilter, DEFAULT_PAGE_SIZE};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClipsQuery {
    #[serde(alias = "videoID")]
    pub video_id: Option<String>,
    /// `true`, `false` or `null`
    pub is_passed: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListClipsQuery {
    fn into_filter(self) -> ApiResult<ClipFilter> {
        let decision = match self.is_passed.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                DecisionFilter::parse(raw)
                    .ok_or_else(|| ApiError::bad_request("isPassed must be true, false or null"))?,
            ),
        };

        Ok(ClipFilter {
            video_id: self.video_id.filter(|v| !v.trim().is_empty()).map(VideoId::from),
            decision,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        }
        .normalized())
    }
}

/// Newest-first clip listing.
pub async fn list_clips(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListClipsQuery>,
) -> ApiResult<Json<ClipPage>> {
    let filter = query.into_filter()?;
    let page = state.store.list_clips(&filter).await?;
    Ok(Json(page))
}
