//! Shot detection for source videos.
//!
//! This crate provides a GraphQL client for the external detection job
//! service and the monitor that submits a job, polls it to completion, and
//! turns the raw output into clip boundaries.

pub mod client;
pub mod error;
pub mod monitor;
pub mod types;

pub use client::{DetectorClient, DetectorClientConfig};
pub use error::{DetectorError, DetectorResult};
pub use monitor::{DetectorJobService, MonitorConfig, SegmentationMonitor};
pub use types::{JobId, PollStatus};
