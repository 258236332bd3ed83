//! Segmentation worker.
//!
//! This crate provides:
//! - The claim loop that moves READY videos to COMPLETED or FAILED
//! - The per-video pipeline (shot detection, clip rows, cut and upload)
//! - The Clip Materializer that persists artifact links clip by clip
//! - Structured per-video logging and Prometheus counters

pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod materializer;
pub mod metrics;
pub mod processor;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

pub use collaborators::{FfmpegTools, MediaTools, SegmentDetector};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{VideoOutcome, WorkerExecutor};
pub use logging::VideoLogger;
pub use materializer::{ClipMaterializer, MaterializeSummary};
pub use processor::{ProcessSummary, VideoProcessor};
