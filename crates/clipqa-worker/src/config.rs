//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep when no READY video exists or the claim faulted
    pub idle_poll_interval: Duration,
    /// Work directory for downloads, cuts and sidecars
    pub work_dir: PathBuf,
    /// Keep per-video temp files after processing
    pub keep_artifacts: bool,
    /// Source download timeout
    pub download_timeout: Duration,
    /// Per-clip FFmpeg timeout
    pub cut_timeout: Duration,
    /// Retries per artifact upload (not counting the first attempt)
    pub upload_retries: u32,
    /// Serve Prometheus metrics
    pub metrics_enabled: bool,
    /// Metrics listener port
    pub metrics_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_poll_interval: Duration::from_secs(60),
            work_dir: PathBuf::from("/tmp/clipqa"),
            keep_artifacts: false,
            download_timeout: Duration::from_secs(3600),
            cut_timeout: Duration::from_secs(600),
            upload_retries: 2,
            metrics_enabled: true,
            metrics_port: 9100,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            idle_poll_interval: Duration::from_secs(
                std::env::var("WORKER_IDLE_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            keep_artifacts: env_flag("WORKER_KEEP_ARTIFACTS", false),
            download_timeout: Duration::from_secs(
                std::env::var("WORKER_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            cut_timeout: Duration::from_secs(
                std::env::var("WORKER_CUT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            upload_retries: std::env::var("WORKER_UPLOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            metrics_enabled: env_flag("METRICS_ENABLED", true),
            metrics_port: std::env::var("WORKER_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(9100),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.idle_poll_interval, Duration::from_secs(60));
        assert_eq!(config.work_dir, PathBuf::from("/tmp/clipqa"));
        assert!(!config.keep_artifacts);
    }
}
