//! In-process record store.
//!
//! Same semantics as the Postgres store with a single async mutex standing in
//! for the transaction scope. Backs the test suites and local API runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use clipqa_models::{
    pick_target, Clip, ClipArtifact, ClipId, LockPolicy, NavigationCursor, ReviewStats,
    ShotBoundary, Verdict, Video, VideoId, VideoStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::traits::{
    guard_foreign_lock, validate_skip_reason, ClipFilter, ClipPage, ClipStore, Pagination,
    ReviewAssignment, ReviewStore, VideoStore,
};

#[derive(Debug, Default)]
struct Tables {
    videos: BTreeMap<VideoId, Video>,
    clips: BTreeMap<ClipId, Clip>,
    next_clip_id: i64,
}

impl Tables {
    fn video_mut(&mut self, video_id: &VideoId) -> StoreResult<&mut Video> {
        self.videos
            .get_mut(video_id)
            .ok_or_else(|| StoreError::not_found(format!("video {}", video_id)))
    }

    fn clip_mut(&mut self, clip_id: ClipId) -> StoreResult<&mut Clip> {
        self.clips
            .get_mut(&clip_id)
            .ok_or_else(|| StoreError::not_found(format!("clip {}", clip_id)))
    }
}

/// Mutex-guarded tables implementing every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.videos.contains_key(&video.video_id) {
            return Err(StoreError::validation(format!(
                "video {} already exists",
                video.video_id
            )));
        }
        tables.videos.insert(video.video_id.clone(), video.clone());
        Ok(())
    }

    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>> {
        Ok(self.tables.lock().await.videos.get(video_id).cloned())
    }

    async fn claim_next_ready(&self, now: DateTime<Utc>) -> StoreResult<Option<Video>> {
        let mut tables = self.tables.lock().await;
        let next = tables
            .videos
            .values()
            .filter(|v| v.status == VideoStatus::Ready)
            .min_by(|a, b| (a.created_at, &a.video_id).cmp(&(b.created_at, &b.video_id)))
            .map(|v| v.video_id.clone());

        let Some(video_id) = next else {
            return Ok(None);
        };

        let video = tables.video_mut(&video_id)?;
        let snapshot = video.clone();
        video.status = VideoStatus::Processing;
        video.updated_at = now;
        metrics::record_claim();
        Ok(Some(snapshot))
    }

    async fn mark_completed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let video = tables.video_mut(video_id)?;
        video.status = VideoStatus::Completed;
        video.error = None;
        video.updated_at = now;
        Ok(())
    }

    async fn mark_failed(&self, video_id: &VideoId, message: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let video = tables.video_mut(video_id)?;
        video.status = VideoStatus::Failed;
        video.error = Some(message.to_string());
        video.updated_at = now;
        Ok(())
    }

    async fn reset_failed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<Video> {
        let mut tables = self.tables.lock().await;
        let video = tables.video_mut(video_id)?;
        if video.status != VideoStatus::Failed {
            return Err(StoreError::validation(format!(
                "video {} is {}, only FAILED videos can be reset",
                video_id, video.status
            )));
        }
        video.status = VideoStatus::Ready;
        video.error = None;
        video.updated_at = now;
        Ok(video.clone())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ClipStore for MemoryStore {
    async fn insert_clips(
        &self,
        video_id: &VideoId,
        boundaries: &[ShotBoundary],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Clip>> {
        let mut tables = self.tables.lock().await;
        if !tables.videos.contains_key(video_id) {
            return Err(StoreError::not_found(format!("video {}", video_id)));
        }
        if let Some(bad) = boundaries.iter().find(|b| b.stop_ms <= b.start_ms) {
            return Err(StoreError::validation(format!(
                "empty clip range {}..{}",
                bad.start_ms, bad.stop_ms
            )));
        }

        let mut inserted = Vec::with_capacity(boundaries.len());
        for boundary in boundaries {
            tables.next_clip_id += 1;
            let clip = Clip::materialized(ClipId(tables.next_clip_id), video_id.clone(), *boundary, now);
            tables.clips.insert(clip.id, clip.clone());
            inserted.push(clip);
        }
        Ok(inserted)
    }

    async fn get_clip(&self, clip_id: ClipId) -> StoreResult<Option<Clip>> {
        Ok(self.tables.lock().await.clips.get(&clip_id).cloned())
    }

    async fn set_artifact(
        &self,
        clip_id: ClipId,
        artifact: ClipArtifact,
        url: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.clip_mut(clip_id)?.set_artifact(artifact, url.to_string(), now);
        Ok(())
    }

    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<ClipPage> {
        let filter = filter.clone().normalized();
        let tables = self.tables.lock().await;

        let mut matching: Vec<&Clip> = tables
            .clips
            .values()
            .filter(|c| filter.video_id.as_ref().map_or(true, |id| &c.video_id == id))
            .filter(|c| filter.decision.map_or(true, |d| d.matches(c.is_passed)))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = matching.len() as i64;
        let clips = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok(ClipPage {
            clips,
            pagination: Pagination::new(total, filter.page, filter.limit),
        })
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn navigate(
        &self,
        cursor: NavigationCursor,
        requester: &str,
        now: DateTime<Utc>,
        policy: &LockPolicy,
    ) -> StoreResult<Option<ReviewAssignment>> {
        let mut tables = self.tables.lock().await;
        let target = pick_target(
            tables
                .clips
                .values()
                .filter(|c| c.is_reviewable_by(requester, now, policy)),
            cursor,
        )
        .map(|c| c.id);

        let Some(clip_id) = target else {
            return Ok(None);
        };

        let clip = tables.clip_mut(clip_id)?;
        clip.lock(requester, now);
        let clip = clip.clone();
        let video = tables.videos.get(&clip.video_id).cloned();
        metrics::record_lock();
        Ok(Some(ReviewAssignment { clip, video }))
    }

    async fn resolve(
        &self,
        clip_id: ClipId,
        verdict: Verdict,
        comment: Option<String>,
        requester: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Clip> {
        let mut tables = self.tables.lock().await;
        let clip = tables.clip_mut(clip_id)?;
        guard_foreign_lock(clip, requester, "resolve")?;
        clip.resolve(verdict, comment, now);
        Ok(clip.clone())
    }

    async fn skip(&self, clip_id: ClipId, reason: &str, requester: &str, now: DateTime<Utc>) -> StoreResult<Clip> {
        let reason = validate_skip_reason(reason)?;
        let mut tables = self.tables.lock().await;
        let clip = tables.clip_mut(clip_id)?;
        guard_foreign_lock(clip, requester, "skip")?;
        clip.skip(reason, requester, now);
        Ok(clip.clone())
    }

    async fn unlock(&self, clip_id: ClipId, requester: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.clips.get_mut(&clip_id) {
            Some(clip) if clip.qa_locked_by.as_deref() == Some(requester) => {
                clip.release_lock();
                clip.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats(&self, now: DateTime<Utc>, policy: &LockPolicy) -> StoreResult<ReviewStats> {
        let tables = self.tables.lock().await;
        Ok(ReviewStats::from_clips(tables.clips.values(), now, policy))
    }
}
