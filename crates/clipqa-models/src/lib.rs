//! Shared data models for the ClipQA pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Source videos and their processing status
//! - Clips and their review outcome
//! - Detector shot boundaries and the clip filter rule
//! - Review lock expiry, queue navigation and statistics

pub mod boundary;
pub mod clip;
pub mod error;
pub mod review;
pub mod timestamp;
pub mod video;

// Re-export common types
pub use boundary::{
    filter_boundaries, DetectedSegment, ShotBoundary, MAX_CLIP_DURATION_MS, MIN_SHOT_DURATION_MS,
    SHOT_LABEL,
};
pub use clip::{Clip, ClipArtifact, ClipId, ReviewOutcome, Verdict};
pub use error::{ModelError, ModelResult};
pub use review::{pick_target, Direction, LockPolicy, NavigationCursor, ReviewStats};
pub use video::{Video, VideoId, VideoStatus};
