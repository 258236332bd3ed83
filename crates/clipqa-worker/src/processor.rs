//! Per-video pipeline: detect, materialize, download, cut and upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{warn, Instrument};

use clipqa_models::Video;

use crate::collaborators::{MediaTools, SegmentDetector};
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::VideoLogger;
use crate::materializer::{ClipMaterializer, MaterializeSummary};

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub boundaries: usize,
    pub artifacts: MaterializeSummary,
}

pub struct VideoProcessor {
    detector: Arc<dyn SegmentDetector>,
    media: Arc<dyn MediaTools>,
    materializer: ClipMaterializer,
    config: WorkerConfig,
}

impl VideoProcessor {
    pub fn new(
        detector: Arc<dyn SegmentDetector>,
        media: Arc<dyn MediaTools>,
        materializer: ClipMaterializer,
        config: WorkerConfig,
    ) -> Self {
        Self {
            detector,
            media,
            materializer,
            config,
        }
    }

    /// Directory holding one video's temp files.
    pub fn video_dir(&self, video: &Video) -> PathBuf {
        self.config.work_dir.join(video.video_id.as_str())
    }

    /// Run the pipeline for a claimed video. Any error is a pipeline fault
    /// for this video; status transitions belong to the caller.
    pub async fn process(&self, video: &Video) -> WorkerResult<ProcessSummary> {
        let logger = VideoLogger::new(&video.video_id, "segmentation");
        let work_dir = self.video_dir(video);

        let result = self
            .run_pipeline(video, &work_dir, &logger)
            .instrument(logger.create_span())
            .await;
        if let Err(e) = &result {
            logger.log_error(&e.to_string());
        }

        if !self.config.keep_artifacts {
            cleanup(&work_dir).await;
        }
        result
    }

    async fn run_pipeline(
        &self,
        video: &Video,
        work_dir: &Path,
        logger: &VideoLogger,
    ) -> WorkerResult<ProcessSummary> {
        logger.log_start(&video.url);

        let boundaries = self.detector.detect_segments(&video.url).await?;
        logger.log_progress(&format!("{} clip boundaries accepted", boundaries.len()));

        let clips = self.materializer.materialize(video, &boundaries).await?;
        if clips.is_empty() {
            logger.log_completion("no shots long enough to clip");
            return Ok(ProcessSummary::default());
        }

        tokio::fs::create_dir_all(work_dir).await?;
        let source = work_dir.join(format!("{}.mp4", video.video_id));
        self.media.download(&video.url, &source).await?;
        logger.log_progress("source downloaded");

        let artifacts = self
            .materializer
            .produce_artifacts(video, &clips, &source, work_dir, logger)
            .await?;

        logger.log_completion(&format!(
            "{} clips, {} uploads, {} skipped",
            artifacts.clips, artifacts.uploaded, artifacts.skipped
        ));

        Ok(ProcessSummary {
            boundaries: boundaries.len(),
            artifacts,
        })
    }
}

async fn cleanup(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
    }
}
