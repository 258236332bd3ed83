//! Segmentation job monitor: submit, poll until complete, filter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use clipqa_models::{filter_boundaries, ShotBoundary};

use crate::error::DetectorResult;
use crate::types::{JobId, PollStatus};

/// External asynchronous detection job service.
#[async_trait]
pub trait DetectorJobService: Send + Sync {
    /// Submit a source for shot detection and return the job id.
    async fn submit(&self, source_url: &str) -> DetectorResult<JobId>;

    /// Check whether the job finished and, if so, return its raw output.
    async fn poll_status(&self, job_id: &JobId) -> DetectorResult<PollStatus>;
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Wait between status polls
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl MonitorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("DETECTOR_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Drives one detection job from submission to a clip boundary list.
///
/// There is no overall deadline; the loop ends when the service reports
/// completion or a call fails. Callers that need a bound wrap the future in
/// `tokio::time::timeout`.
pub struct SegmentationMonitor {
    service: Arc<dyn DetectorJobService>,
    config: MonitorConfig,
}

impl SegmentationMonitor {
    pub fn new(service: Arc<dyn DetectorJobService>, config: MonitorConfig) -> Self {
        Self { service, config }
    }

    /// Detect shots in `source_url` and return filtered clip boundaries in
    /// detector order.
    pub async fn detect_segments(&self, source_url: &str) -> DetectorResult<Vec<ShotBoundary>> {
        let job_id = self.service.submit(source_url).await?;
        info!(job_id = %job_id, "Detection job submitted");

        let mut polls: u32 = 0;
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            polls += 1;

            match self.service.poll_status(&job_id).await? {
                PollStatus::Pending => {
                    debug!(job_id = %job_id, polls, "Detection job still running");
                }
                PollStatus::Complete(segments) => {
                    let boundaries = filter_boundaries(&segments);
                    info!(
                        job_id = %job_id,
                        polls,
                        detected = segments.len(),
                        kept = boundaries.len(),
                        "Detection job complete"
                    );
                    return Ok(boundaries);
                }
            }
        }
    }
}
