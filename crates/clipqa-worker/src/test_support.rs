//! In-process fakes for the pipeline collaborators.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use clipqa_detector::{DetectorError, DetectorJobService, DetectorResult, JobId, PollStatus};
use clipqa_media::{MediaError, VideoInfo};
use clipqa_models::{
    Clip, ClipArtifact, ClipId, LockPolicy, NavigationCursor, ReviewStats, ShotBoundary, Verdict, Video, VideoId,
};
use clipqa_storage::{ArtifactUploader, StorageError, StorageResult, UploadOutcome};
use clipqa_store::{
    ClipFilter, ClipPage, ClipStore, MemoryStore, ReviewAssignment, ReviewStore, StoreError, StoreResult, VideoStore,
};

use crate::collaborators::{MediaTools, SegmentDetector};
use crate::error::{WorkerError, WorkerResult};

pub struct FakeDetector {
    result: Result<Vec<ShotBoundary>, String>,
}

impl FakeDetector {
    pub fn returning(ranges: Vec<(i64, i64)>) -> Self {
        Self {
            result: Ok(ranges
                .into_iter()
                .map(|(start_ms, stop_ms)| ShotBoundary { start_ms, stop_ms })
                .collect()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl SegmentDetector for FakeDetector {
    async fn detect_segments(&self, _source_url: &str) -> WorkerResult<Vec<ShotBoundary>> {
        self.result
            .clone()
            .map_err(|msg| WorkerError::from(DetectorError::GraphQl(msg)))
    }
}

/// Job service replaying poll results.
pub struct ScriptedJobs {
    polls: Mutex<VecDeque<PollStatus>>,
}

impl ScriptedJobs {
    pub fn new(polls: Vec<PollStatus>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
        }
    }
}

#[async_trait]
impl DetectorJobService for ScriptedJobs {
    async fn submit(&self, _source_url: &str) -> DetectorResult<JobId> {
        Ok(JobId("job-1".to_string()))
    }

    async fn poll_status(&self, _job_id: &JobId) -> DetectorResult<PollStatus> {
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DetectorError::InvalidResponse("script exhausted".into()))
    }
}

/// Writes placeholder files instead of running ffmpeg.
pub struct FakeMedia {
    fail_download: bool,
    fail_cut_at: Option<i64>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self {
            fail_download: false,
            fail_cut_at: None,
        }
    }

    pub fn failing_download(mut self) -> Self {
        self.fail_download = true;
        self
    }

    /// Fail the cut of the clip starting at `start_ms`.
    pub fn failing_cut_at(mut self, start_ms: i64) -> Self {
        self.fail_cut_at = Some(start_ms);
        self
    }
}

#[async_trait]
impl MediaTools for FakeMedia {
    async fn download(&self, url: &str, dest: &Path) -> WorkerResult<()> {
        if self.fail_download {
            return Err(MediaError::download_failed(format!("GET {} returned 404", url)).into());
        }
        tokio::fs::write(dest, b"source").await?;
        Ok(())
    }

    async fn cut(&self, _source: &Path, start_ms: i64, end_ms: i64, output: &Path) -> WorkerResult<PathBuf> {
        if self.fail_cut_at == Some(start_ms) {
            return Err(MediaError::ffmpeg_failed("exit 1", None, Some(1)).into());
        }
        if end_ms <= start_ms {
            return Err(MediaError::InvalidRange { start_ms, end_ms }.into());
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"clip").await?;
        Ok(output.to_path_buf())
    }

    async fn probe(&self, _path: &Path) -> WorkerResult<VideoInfo> {
        Ok(VideoInfo {
            width: 1920,
            height: 1080,
            fps: 25.0,
            duration: None,
        })
    }
}

/// Records uploads and returns `<scheme>://<group>/<file>` links.
pub struct FakeUploader {
    scheme: &'static str,
    mode: UploadMode,
    uploads: Mutex<Vec<(String, String)>>,
}

enum UploadMode {
    Ok,
    NotFound,
    Fail,
}

impl FakeUploader {
    pub fn new(scheme: &'static str) -> Self {
        Self {
            scheme,
            mode: UploadMode::Ok,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn not_found(mut self) -> Self {
        self.mode = UploadMode::NotFound;
        self
    }

    pub fn failing(mut self) -> Self {
        self.mode = UploadMode::Fail;
        self
    }

    /// `(group, file name)` in upload order.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactUploader for FakeUploader {
    fn name(&self) -> &'static str {
        self.scheme
    }

    async fn upload(&self, group: &str, local_path: &Path) -> StorageResult<UploadOutcome> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match self.mode {
            UploadMode::NotFound => Ok(UploadOutcome::NotFound),
            UploadMode::Fail => Err(StorageError::upload_failed("connection reset")),
            UploadMode::Ok => {
                self.uploads.lock().unwrap().push((group.to_string(), name.clone()));
                Ok(UploadOutcome::Uploaded(format!("{}://{}/{}", self.scheme, group, name)))
            }
        }
    }
}

/// `MemoryStore` whose first `failures` completion writes fail.
pub struct FailingCompletionStore {
    inner: Arc<MemoryStore>,
    failures: AtomicU32,
}

impl FailingCompletionStore {
    pub fn new(inner: Arc<MemoryStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl VideoStore for FailingCompletionStore {
    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        self.inner.insert_video(video).await
    }

    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>> {
        self.inner.get_video(video_id).await
    }

    async fn claim_next_ready(&self, now: DateTime<Utc>) -> StoreResult<Option<Video>> {
        self.inner.claim_next_ready(now).await
    }

    async fn mark_completed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<()> {
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StoreError::not_found("transient"));
        }
        self.inner.mark_completed(video_id, now).await
    }

    async fn mark_failed(&self, video_id: &VideoId, message: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.inner.mark_failed(video_id, message, now).await
    }

    async fn reset_failed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<Video> {
        self.inner.reset_failed(video_id, now).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

#[async_trait]
impl ClipStore for FailingCompletionStore {
    async fn insert_clips(
        &self,
        video_id: &VideoId,
        boundaries: &[ShotBoundary],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Clip>> {
        self.inner.insert_clips(video_id, boundaries, now).await
    }

    async fn get_clip(&self, clip_id: ClipId) -> StoreResult<Option<Clip>> {
        self.inner.get_clip(clip_id).await
    }

    async fn set_artifact(
        &self,
        clip_id: ClipId,
        artifact: ClipArtifact,
        url: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner.set_artifact(clip_id, artifact, url, now).await
    }

    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<ClipPage> {
        self.inner.list_clips(filter).await
    }
}

#[async_trait]
impl ReviewStore for FailingCompletionStore {
    async fn navigate(
        &self,
        cursor: NavigationCursor,
        requester: &str,
        now: DateTime<Utc>,
        policy: &LockPolicy,
    ) -> StoreResult<Option<ReviewAssignment>> {
        self.inner.navigate(cursor, requester, now, policy).await
    }

    async fn resolve(
        &self,
        clip_id: ClipId,
        verdict: Verdict,
        comment: Option<String>,
        requester: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Clip> {
        self.inner.resolve(clip_id, verdict, comment, requester, now).await
    }

    async fn skip(&self, clip_id: ClipId, reason: &str, requester: &str, now: DateTime<Utc>) -> StoreResult<Clip> {
        self.inner.skip(clip_id, reason, requester, now).await
    }

    async fn unlock(&self, clip_id: ClipId, requester: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.unlock(clip_id, requester, now).await
    }

    async fn stats(&self, now: DateTime<Utc>, policy: &LockPolicy) -> StoreResult<ReviewStats> {
        self.inner.stats(now, policy).await
    }
}
