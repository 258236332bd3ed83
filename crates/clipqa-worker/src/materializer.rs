//! Clip Materializer: clip rows from boundaries, then per-clip cut and upload.
//!
//! Clips are handled strictly one after another and each artifact link is
//! written back as soon as its upload returns. A failed cut or upload only
//! leaves that clip's field empty; store faults abort the video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipqa_media::{clip_output_path, write_sidecar, SidecarMetadata};
use clipqa_models::{Clip, ClipArtifact, ShotBoundary, Video};
use clipqa_storage::{ArtifactUploader, UploadOutcome};
use clipqa_store::RecordStore;

use crate::collaborators::MediaTools;
use crate::error::WorkerResult;
use crate::logging::VideoLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryPolicy};

/// What happened to one video's clips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub clips: usize,
    pub cut_failures: usize,
    pub uploaded: usize,
    pub skipped: usize,
}

pub struct ClipMaterializer {
    store: Arc<dyn RecordStore>,
    media: Arc<dyn MediaTools>,
    drive: Arc<dyn ArtifactUploader>,
    object_store: Arc<dyn ArtifactUploader>,
    upload_retry: RetryPolicy,
}

impl ClipMaterializer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        media: Arc<dyn MediaTools>,
        drive: Arc<dyn ArtifactUploader>,
        object_store: Arc<dyn ArtifactUploader>,
        upload_retries: u32,
    ) -> Self {
        Self {
            store,
            media,
            drive,
            object_store,
            upload_retry: RetryPolicy::new("artifact upload", upload_retries),
        }
    }

    /// Insert one fresh clip per boundary. Never touches existing clips.
    pub async fn materialize(&self, video: &Video, boundaries: &[ShotBoundary]) -> WorkerResult<Vec<Clip>> {
        let clips = self
            .store
            .insert_clips(&video.video_id, boundaries, chrono::Utc::now())
            .await?;
        metrics::record_clips_materialized(clips.len());
        Ok(clips)
    }

    /// Cut and upload every clip in order.
    pub async fn produce_artifacts(
        &self,
        video: &Video,
        clips: &[Clip],
        source: &Path,
        work_dir: &Path,
        logger: &VideoLogger,
    ) -> WorkerResult<MaterializeSummary> {
        let mut summary = MaterializeSummary {
            clips: clips.len(),
            ..Default::default()
        };

        for (index, clip) in clips.iter().enumerate() {
            logger.log_progress(&format!(
                "clip {}/{} ({}ms..{}ms)",
                index + 1,
                clips.len(),
                clip.start_ms,
                clip.end_ms
            ));
            self.produce_clip(video, clip, source, work_dir, logger, &mut summary)
                .await?;
        }

        Ok(summary)
    }

    async fn produce_clip(
        &self,
        video: &Video,
        clip: &Clip,
        source: &Path,
        work_dir: &Path,
        logger: &VideoLogger,
        summary: &mut MaterializeSummary,
    ) -> WorkerResult<()> {
        let output = clip_output_path(work_dir, &video.video_id, clip.start_ms, clip.end_ms);
        let clip_file = match self.media.cut(source, clip.start_ms, clip.end_ms, &output).await {
            Ok(path) => path,
            Err(e) => {
                logger.log_warning(&format!("cut failed for clip {}: {}", clip.id, e));
                summary.cut_failures += 1;
                for artifact in [ClipArtifact::DriveClip, ClipArtifact::ClipFile, ClipArtifact::Sidecar] {
                    summary.skipped += 1;
                    metrics::record_artifact_skipped(artifact.column(), "error");
                }
                return Ok(());
            }
        };

        let group = video.video_id.as_str();
        self.upload_artifact(&*self.drive, group, clip, ClipArtifact::DriveClip, &clip_file, logger, summary)
            .await?;
        self.upload_artifact(&*self.object_store, group, clip, ClipArtifact::ClipFile, &clip_file, logger, summary)
            .await?;

        match self.render_sidecar(video, clip, &clip_file, work_dir).await {
            Ok(sidecar) => {
                self.upload_artifact(&*self.object_store, group, clip, ClipArtifact::Sidecar, &sidecar, logger, summary)
                    .await?;
            }
            Err(e) => {
                logger.log_warning(&format!("sidecar failed for clip {}: {}", clip.id, e));
                summary.skipped += 1;
                metrics::record_artifact_skipped(ClipArtifact::Sidecar.column(), "error");
            }
        }

        Ok(())
    }

    async fn render_sidecar(
        &self,
        video: &Video,
        clip: &Clip,
        clip_file: &Path,
        work_dir: &Path,
    ) -> WorkerResult<PathBuf> {
        let info = self.media.probe(clip_file).await?;
        let meta = SidecarMetadata::for_clip(video, clip, &info);
        Ok(write_sidecar(work_dir, clip, &meta).await?)
    }

    /// Upload one artifact and persist its link. Only the store write can fail
    /// the video.
    #[allow(clippy::too_many_arguments)]
    async fn upload_artifact(
        &self,
        uploader: &dyn ArtifactUploader,
        group: &str,
        clip: &Clip,
        artifact: ClipArtifact,
        local_path: &Path,
        logger: &VideoLogger,
        summary: &mut MaterializeSummary,
    ) -> WorkerResult<()> {
        let result = retry_async(&self.upload_retry, || uploader.upload(group, local_path)).await;

        match result {
            Ok(UploadOutcome::Uploaded(url)) => {
                self.store
                    .set_artifact(clip.id, artifact, &url, chrono::Utc::now())
                    .await?;
                summary.uploaded += 1;
                metrics::record_artifact_uploaded(artifact.column());
            }
            Ok(UploadOutcome::NotFound) => {
                logger.log_warning(&format!(
                    "{} for clip {} not found at {}",
                    artifact.column(),
                    clip.id,
                    local_path.display()
                ));
                summary.skipped += 1;
                metrics::record_artifact_skipped(artifact.column(), "not_found");
            }
            Err(e) => {
                logger.log_warning(&format!(
                    "{} upload via {} failed for clip {}: {}",
                    artifact.column(),
                    uploader.name(),
                    clip.id,
                    e
                ));
                summary.skipped += 1;
                metrics::record_artifact_skipped(artifact.column(), "error");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeMedia, FakeUploader};
    use clipqa_models::VideoId;
    use clipqa_store::{ClipStore, MemoryStore, VideoStore};

    async fn setup(
        media: FakeMedia,
        drive: FakeUploader,
        object_store: FakeUploader,
    ) -> (Arc<MemoryStore>, ClipMaterializer, Arc<FakeUploader>, Arc<FakeUploader>, Video) {
        let store = Arc::new(MemoryStore::new());
        let video = Video::ready("vid-1", "https://cdn.example/vid-1.mp4", chrono::Utc::now());
        store.insert_video(&video).await.unwrap();

        let drive = Arc::new(drive);
        let object_store = Arc::new(object_store);
        let materializer = ClipMaterializer::new(
            store.clone(),
            Arc::new(media),
            drive.clone(),
            object_store.clone(),
            0,
        );
        (store, materializer, drive, object_store, video)
    }

    fn boundaries() -> Vec<ShotBoundary> {
        vec![
            ShotBoundary { start_ms: 1_000, stop_ms: 12_000 },
            ShotBoundary { start_ms: 15_000, stop_ms: 35_000 },
        ]
    }

    #[tokio::test]
    async fn test_all_artifacts_persisted_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, materializer, drive, object_store, video) =
            setup(FakeMedia::new(), FakeUploader::new("drive"), FakeUploader::new("s3")).await;

        let clips = materializer.materialize(&video, &boundaries()).await.unwrap();
        let summary = materializer
            .produce_artifacts(&video, &clips, Path::new("/src.mp4"), dir.path(), &VideoLogger::new(&video.video_id, "test"))
            .await
            .unwrap();

        assert_eq!(summary, MaterializeSummary { clips: 2, cut_failures: 0, uploaded: 6, skipped: 0 });

        let first = store.get_clip(clips[0].id).await.unwrap().unwrap();
        assert!(first.drive_clip_url.as_deref().unwrap().starts_with("drive://vid-1/"));
        assert!(first.clip_path.as_deref().unwrap().ends_with(".mp4"));
        assert!(first.xml_path.as_deref().unwrap().ends_with(".xml"));

        // mp4 then xml per clip, never an xml before its clip
        let uploads = object_store.uploads();
        let names: Vec<&str> = uploads.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "vid-1-00:00:01-00:00:12.mp4",
                "vid-1-00:00:01-00:00:12.xml",
                "vid-1-00:00:15-00:00:35.mp4",
                "vid-1-00:00:15-00:00:35.xml",
            ]
        );
        assert_eq!(drive.uploads().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_cut_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let (store, materializer, _drive, _object_store, video) = setup(
            FakeMedia::new().failing_cut_at(1_000),
            FakeUploader::new("drive"),
            FakeUploader::new("s3"),
        )
        .await;

        let clips = materializer.materialize(&video, &boundaries()).await.unwrap();
        let summary = materializer
            .produce_artifacts(&video, &clips, Path::new("/src.mp4"), dir.path(), &VideoLogger::new(&video.video_id, "test"))
            .await
            .unwrap();

        assert_eq!(summary.cut_failures, 1);
        assert_eq!(summary.uploaded, 3);

        let first = store.get_clip(clips[0].id).await.unwrap().unwrap();
        assert!(first.drive_clip_url.is_none() && first.clip_path.is_none() && first.xml_path.is_none());
        let second = store.get_clip(clips[1].id).await.unwrap().unwrap();
        assert!(second.drive_clip_url.is_some() && second.clip_path.is_some() && second.xml_path.is_some());
    }

    #[tokio::test]
    async fn test_not_found_and_errors_leave_field_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (store, materializer, _drive, _object_store, video) = setup(
            FakeMedia::new(),
            FakeUploader::new("drive").not_found(),
            FakeUploader::new("s3").failing(),
        )
        .await;

        let clips = materializer.materialize(&video, &boundaries()[..1]).await.unwrap();
        let summary = materializer
            .produce_artifacts(&video, &clips, Path::new("/src.mp4"), dir.path(), &VideoLogger::new(&video.video_id, "test"))
            .await
            .unwrap();

        assert_eq!(summary, MaterializeSummary { clips: 1, cut_failures: 0, uploaded: 0, skipped: 3 });
        let clip = store.get_clip(clips[0].id).await.unwrap().unwrap();
        assert_eq!(clip.drive_clip_url, None);
        assert_eq!(clip.clip_path, None);
        assert_eq!(clip.xml_path, None);
    }

    #[tokio::test]
    async fn test_materialize_is_additive() {
        let (store, materializer, _, _, video) =
            setup(FakeMedia::new(), FakeUploader::new("drive"), FakeUploader::new("s3")).await;

        let first = materializer.materialize(&video, &boundaries()).await.unwrap();
        let second = materializer.materialize(&video, &boundaries()[..1]).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);

        let page = store
            .list_clips(&clipqa_store::ClipFilter {
                video_id: Some(VideoId::from("vid-1")),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 3);
        assert!(page.clips.iter().all(|c| c.is_passed.is_none() && !c.is_skipped && c.qa_locked_by.is_none()));
    }
}
