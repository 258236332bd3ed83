//! Repository seams shared by the worker and the reviewer API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use clipqa_models::{
    Clip, ClipArtifact, ClipId, LockPolicy, NavigationCursor, ReviewStats, ShotBoundary, Verdict,
    Video, VideoId,
};

use crate::error::StoreResult;

/// Largest page size served by clip listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size for clip listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Work Claimer side of the store.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert a READY video. Used by ingestion and tests.
    async fn insert_video(&self, video: &Video) -> StoreResult<()>;

    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>>;

    /// Atomically move the oldest READY video to PROCESSING.
    ///
    /// Returns the pre-transition snapshot, or `None` when nothing is READY.
    async fn claim_next_ready(&self, now: DateTime<Utc>) -> StoreResult<Option<Video>>;

    async fn mark_completed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<()>;

    async fn mark_failed(&self, video_id: &VideoId, message: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Operator reset of a FAILED video back to READY.
    async fn reset_failed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<Video>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}

/// Clip Materializer side of the store.
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Insert one fresh clip per boundary, in order, in one transaction.
    async fn insert_clips(
        &self,
        video_id: &VideoId,
        boundaries: &[ShotBoundary],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Clip>>;

    async fn get_clip(&self, clip_id: ClipId) -> StoreResult<Option<Clip>>;

    /// Persist one artifact link on a clip.
    async fn set_artifact(
        &self,
        clip_id: ClipId,
        artifact: ClipArtifact,
        url: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Newest-first listing with optional filters.
    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<ClipPage>;
}

/// Review Lock Manager side of the store.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Select the next reviewable clip for `requester` and lock it in the
    /// same transaction.
    async fn navigate(
        &self,
        cursor: NavigationCursor,
        requester: &str,
        now: DateTime<Utc>,
        policy: &LockPolicy,
    ) -> StoreResult<Option<ReviewAssignment>>;

    /// Record a verdict. Rejected when another reviewer's name is on the lock.
    async fn resolve(
        &self,
        clip_id: ClipId,
        verdict: Verdict,
        comment: Option<String>,
        requester: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Clip>;

    /// Mark a clip skipped. Requires a non-empty reason.
    async fn skip(&self, clip_id: ClipId, reason: &str, requester: &str, now: DateTime<Utc>) -> StoreResult<Clip>;

    /// Release `requester`'s lock. Returns whether anything was released;
    /// never fails on a mismatch.
    async fn unlock(&self, clip_id: ClipId, requester: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn stats(&self, now: DateTime<Utc>, policy: &LockPolicy) -> StoreResult<ReviewStats>;
}

/// Everything the binaries need from one backing store.
pub trait RecordStore: VideoStore + ClipStore + ReviewStore {}

impl<T> RecordStore for T where T: VideoStore + ClipStore + ReviewStore {}

/// A clip locked for a reviewer together with its parent video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAssignment {
    pub clip: Clip,
    pub video: Option<Video>,
}

/// Verdict filter for clip listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionFilter {
    Passed,
    Failed,
    Undecided,
}

impl DecisionFilter {
    /// `true`, `false` or `null`, as sent by the review UI.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "true" => Some(DecisionFilter::Passed),
            "false" => Some(DecisionFilter::Failed),
            "null" => Some(DecisionFilter::Undecided),
            _ => None,
        }
    }

    pub fn matches(&self, is_passed: Option<bool>) -> bool {
        match self {
            DecisionFilter::Passed => is_passed == Some(true),
            DecisionFilter::Failed => is_passed == Some(false),
            DecisionFilter::Undecided => is_passed.is_none(),
        }
    }
}

/// Clip listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipFilter {
    pub video_id: Option<VideoId>,
    pub decision: Option<DecisionFilter>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ClipFilter {
    fn default() -> Self {
        Self {
            video_id: None,
            decision: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClipFilter {
    /// Clamp page to >= 1 and limit to `1..=MAX_PAGE_SIZE`.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit as i64
    }
}

/// One page of a clip listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipPage {
    pub clips: Vec<Clip>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let limit_i = limit.max(1) as i64;
        Self {
            total,
            page,
            limit,
            total_pages: (total + limit_i - 1) / limit_i,
        }
    }
}

/// Reject resolve/skip when someone else's name is on the lock. Expiry is
/// not consulted; a stale foreign lock blocks until navigate takes it over.
pub(crate) fn guard_foreign_lock(clip: &Clip, requester: &str, operation: &'static str) -> StoreResult<()> {
    if clip.is_locked_by_other(requester) {
        crate::metrics::record_lock_conflict(operation);
        return Err(crate::error::StoreError::LockedByAnotherUser {
            clip_id: clip.id,
            locked_by: clip.qa_locked_by.clone().unwrap_or_default(),
        });
    }
    Ok(())
}

/// Reject blank skip reasons before touching the store.
pub(crate) fn validate_skip_reason(reason: &str) -> StoreResult<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(crate::error::StoreError::validation("Skip reason is required"));
    }
    Ok(reason)
}
