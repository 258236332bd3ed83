//! Seams over the external tools the pipeline drives.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use clipqa_detector::SegmentationMonitor;
use clipqa_media::{cut_clip_with, probe_video, CutSettings, FfmpegRunner, SourceDownloader, VideoInfo};
use clipqa_models::ShotBoundary;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Turns a source URL into filtered clip boundaries.
#[async_trait]
pub trait SegmentDetector: Send + Sync {
    async fn detect_segments(&self, source_url: &str) -> WorkerResult<Vec<ShotBoundary>>;
}

#[async_trait]
impl SegmentDetector for SegmentationMonitor {
    async fn detect_segments(&self, source_url: &str) -> WorkerResult<Vec<ShotBoundary>> {
        Ok(SegmentationMonitor::detect_segments(self, source_url).await?)
    }
}

/// Download, cut and probe.
#[async_trait]
pub trait MediaTools: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> WorkerResult<()>;

    async fn cut(&self, source: &Path, start_ms: i64, end_ms: i64, output: &Path) -> WorkerResult<PathBuf>;

    async fn probe(&self, path: &Path) -> WorkerResult<VideoInfo>;
}

/// `ffmpeg` / `ffprobe` and HTTP download.
pub struct FfmpegTools {
    downloader: SourceDownloader,
    runner: FfmpegRunner,
    settings: CutSettings,
}

impl FfmpegTools {
    pub fn new(config: &WorkerConfig) -> WorkerResult<Self> {
        Ok(Self {
            downloader: SourceDownloader::new(config.download_timeout)?,
            runner: FfmpegRunner::new().with_timeout(config.cut_timeout),
            settings: CutSettings::default(),
        })
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn download(&self, url: &str, dest: &Path) -> WorkerResult<()> {
        self.downloader.download(url, dest).await?;
        Ok(())
    }

    async fn cut(&self, source: &Path, start_ms: i64, end_ms: i64, output: &Path) -> WorkerResult<PathBuf> {
        Ok(cut_clip_with(source, start_ms, end_ms, output, &self.settings, &self.runner).await?)
    }

    async fn probe(&self, path: &Path) -> WorkerResult<VideoInfo> {
        Ok(probe_video(path).await?)
    }
}
