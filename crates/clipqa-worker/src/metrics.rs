//! Worker Prometheus metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

pub mod names {
    pub const VIDEOS_CLAIMED_TOTAL: &str = "clipqa_worker_videos_claimed_total";
    pub const VIDEOS_COMPLETED_TOTAL: &str = "clipqa_worker_videos_completed_total";
    pub const VIDEOS_FAILED_TOTAL: &str = "clipqa_worker_videos_failed_total";
    pub const VIDEO_DURATION_SECONDS: &str = "clipqa_worker_video_duration_seconds";
    pub const CLIPS_MATERIALIZED_TOTAL: &str = "clipqa_worker_clips_materialized_total";
    pub const ARTIFACTS_UPLOADED_TOTAL: &str = "clipqa_worker_artifacts_uploaded_total";
    pub const ARTIFACTS_SKIPPED_TOTAL: &str = "clipqa_worker_artifacts_skipped_total";
}

/// Serve `/metrics` on `0.0.0.0:port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
        .map_err(|e| WorkerError::config_error(format!("Failed to install metrics exporter: {}", e)))
}

pub fn record_claimed() {
    counter!(names::VIDEOS_CLAIMED_TOTAL).increment(1);
}

pub fn record_completed(duration_secs: f64) {
    counter!(names::VIDEOS_COMPLETED_TOTAL).increment(1);
    histogram!(names::VIDEO_DURATION_SECONDS, "outcome" => "completed").record(duration_secs);
}

pub fn record_failed(duration_secs: f64) {
    counter!(names::VIDEOS_FAILED_TOTAL).increment(1);
    histogram!(names::VIDEO_DURATION_SECONDS, "outcome" => "failed").record(duration_secs);
}

pub fn record_clips_materialized(count: usize) {
    counter!(names::CLIPS_MATERIALIZED_TOTAL).increment(count as u64);
}

pub fn record_artifact_uploaded(artifact: &'static str) {
    counter!(names::ARTIFACTS_UPLOADED_TOTAL, "artifact" => artifact).increment(1);
}

/// `reason` is `not_found` or `error`.
pub fn record_artifact_skipped(artifact: &'static str, reason: &'static str) {
    counter!(names::ARTIFACTS_SKIPPED_TOTAL, "artifact" => artifact, "reason" => reason).increment(1);
}
