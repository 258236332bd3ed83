//! Claim loop.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use clipqa_models::VideoId;
use clipqa_store::RecordStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::processor::{ProcessSummary, VideoProcessor};
use crate::retry::LogThrottle;

/// How a claimed video ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    Completed { video_id: VideoId, summary: ProcessSummary },
    Failed { video_id: VideoId, error: String },
}

/// Claims READY videos one at a time and runs them to a terminal status.
pub struct WorkerExecutor {
    store: Arc<dyn RecordStore>,
    processor: VideoProcessor,
    config: WorkerConfig,
    shutdown: watch::Sender<bool>,
}

impl WorkerExecutor {
    pub fn new(store: Arc<dyn RecordStore>, processor: VideoProcessor, config: WorkerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            processor,
            config,
            shutdown,
        }
    }

    /// Poll until shutdown. A video in flight always finishes first.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting worker, work dir {}, idle poll {:?}",
            self.config.work_dir.display(),
            self.config.idle_poll_interval
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut claim_faults = LogThrottle::new(5);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(Some(_)) => {
                    claim_faults.recovered();
                    false
                }
                Ok(None) => {
                    claim_faults.recovered();
                    true
                }
                Err(e) => {
                    if claim_faults.fault() {
                        warn!("Store unavailable, retrying next poll: {}", e);
                    }
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(self.config.idle_poll_interval) => {}
                }
            }
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Claim one video and process it. `Ok(None)` when nothing is READY.
    ///
    /// Pipeline faults mark the video FAILED and are not returned; an `Err`
    /// here is a store fault during the claim or the final status write.
    pub async fn run_once(&self) -> WorkerResult<Option<VideoOutcome>> {
        let Some(video) = self.store.claim_next_ready(Utc::now()).await? else {
            return Ok(None);
        };
        metrics::record_claimed();
        info!(video_id = %video.video_id, "Claimed video");

        let started = Instant::now();
        let summary = match self.processor.process(&video).await {
            Ok(summary) => summary,
            Err(e) => return self.fail_video(video.video_id, e.to_string(), started).await,
        };

        if let Err(e) = self.store.mark_completed(&video.video_id, Utc::now()).await {
            let message = format!("Failed to record completion: {}", e);
            return self.fail_video(video.video_id, message, started).await;
        }

        metrics::record_completed(started.elapsed().as_secs_f64());
        info!(video_id = %video.video_id, clips = summary.artifacts.clips, "Video completed");
        Ok(Some(VideoOutcome::Completed {
            video_id: video.video_id,
            summary,
        }))
    }

    /// Move a claimed video to FAILED. Only a store fault on this write is
    /// returned.
    async fn fail_video(
        &self,
        video_id: VideoId,
        message: String,
        started: Instant,
    ) -> WorkerResult<Option<VideoOutcome>> {
        error!(video_id = %video_id, "Video failed: {}", message);
        self.store.mark_failed(&video_id, &message, Utc::now()).await?;
        metrics::record_failed(started.elapsed().as_secs_f64());
        Ok(Some(VideoOutcome::Failed {
            video_id,
            error: message,
        }))
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
