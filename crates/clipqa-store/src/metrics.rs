//! Store metrics collection.
//!
//! - Operation counters by operation and outcome
//! - Latency histograms
//! - Work claim and review lock counters

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Store operations by operation and outcome.
    pub const OPERATIONS_TOTAL: &str = "store_operations_total";

    /// Operation latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "store_latency_seconds";

    /// Videos moved out of READY by a worker claim.
    pub const VIDEO_CLAIMS_TOTAL: &str = "store_video_claims_total";

    /// Review locks written by navigate.
    pub const REVIEW_LOCKS_TOTAL: &str = "store_review_locks_total";

    /// Resolve/skip attempts rejected by another reviewer's lock.
    pub const LOCK_CONFLICTS_TOTAL: &str = "store_lock_conflicts_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a completed store operation.
pub fn record_operation(operation: &'static str, outcome: &'static str, latency_ms: f64) {
    counter!(
        names::OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_ms / 1000.0);
}

pub fn record_claim() {
    counter!(names::VIDEO_CLAIMS_TOTAL).increment(1);
}

pub fn record_lock() {
    counter!(names::REVIEW_LOCKS_TOTAL).increment(1);
}

pub fn record_lock_conflict(operation: &'static str) {
    counter!(names::LOCK_CONFLICTS_TOTAL, "operation" => operation).increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::OPERATIONS_TOTAL.starts_with("store_"));
        assert!(names::VIDEO_CLAIMS_TOTAL.contains("claims"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }
}
