//! Shot boundaries reported by the segmentation detector.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Detector label marking a shot segment.
pub const SHOT_LABEL: &str = "Shot";

/// Segments this long or shorter are discarded.
pub const MIN_SHOT_DURATION_MS: i64 = 9_000;

/// Longer segments are clamped to this length.
pub const MAX_CLIP_DURATION_MS: i64 = 20_000;

/// One raw labelled segment from the detector output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSegment {
    pub label: String,
    pub start_ms: i64,
    pub stop_ms: i64,
}

impl DetectedSegment {
    pub fn new(label: impl Into<String>, start_ms: i64, stop_ms: i64) -> Self {
        Self {
            label: label.into(),
            start_ms,
            stop_ms,
        }
    }

    pub fn is_shot(&self) -> bool {
        self.label.eq_ignore_ascii_case(SHOT_LABEL)
    }

    pub fn duration_ms(&self) -> i64 {
        self.stop_ms.saturating_sub(self.start_ms)
    }
}

/// A `[start, stop)` millisecond interval that becomes one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShotBoundary {
    pub start_ms: i64,
    pub stop_ms: i64,
}

impl ShotBoundary {
    pub fn duration_ms(&self) -> i64 {
        self.stop_ms.saturating_sub(self.start_ms)
    }
}

/// Turn detector output into clip boundaries.
///
/// Keeps only shot segments longer than [`MIN_SHOT_DURATION_MS`], clamps
/// anything longer than [`MAX_CLIP_DURATION_MS`] to start + max, and
/// preserves detector order. Duplicates are passed through.
pub fn filter_boundaries<'a, I>(segments: I) -> Vec<ShotBoundary>
where
    I: IntoIterator<Item = &'a DetectedSegment>,
{
    segments
        .into_iter()
        .filter(|seg| seg.is_shot())
        .filter(|seg| seg.duration_ms() > MIN_SHOT_DURATION_MS)
        .map(|seg| ShotBoundary {
            start_ms: seg.start_ms,
            stop_ms: if seg.duration_ms() > MAX_CLIP_DURATION_MS {
                seg.start_ms.saturating_add(MAX_CLIP_DURATION_MS)
            } else {
                seg.stop_ms
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(start_ms: i64, stop_ms: i64) -> DetectedSegment {
        DetectedSegment::new(SHOT_LABEL, start_ms, stop_ms)
    }

    #[test]
    fn test_drops_segments_at_or_below_minimum() {
        let segments = vec![shot(0, 9_000), shot(10_000, 10_500)];
        assert!(filter_boundaries(&segments).is_empty());
    }

    #[test]
    fn test_keeps_segment_just_over_minimum() {
        let segments = vec![shot(0, 9_001)];
        assert_eq!(
            filter_boundaries(&segments),
            vec![ShotBoundary { start_ms: 0, stop_ms: 9_001 }]
        );
    }

    #[test]
    fn test_clamps_long_segments() {
        let segments = vec![shot(5_000, 30_000)];
        let boundaries = filter_boundaries(&segments);
        assert_eq!(boundaries, vec![ShotBoundary { start_ms: 5_000, stop_ms: 25_000 }]);
        assert_eq!(boundaries[0].duration_ms(), MAX_CLIP_DURATION_MS);
    }

    #[test]
    fn test_exact_maximum_is_not_clamped() {
        let segments = vec![shot(0, 20_000)];
        assert_eq!(filter_boundaries(&segments)[0].stop_ms, 20_000);
    }

    #[test]
    fn test_ignores_non_shot_labels() {
        let segments = vec![
            DetectedSegment::new("Face", 0, 15_000),
            DetectedSegment::new("shot", 20_000, 35_000),
        ];
        assert_eq!(
            filter_boundaries(&segments),
            vec![ShotBoundary { start_ms: 20_000, stop_ms: 35_000 }]
        );
    }

    #[test]
    fn test_preserves_detector_order() {
        let segments = vec![shot(50_000, 61_000), shot(1_000, 12_000), shot(1_000, 12_000)];
        let starts: Vec<i64> = filter_boundaries(&segments).iter().map(|b| b.start_ms).collect();
        assert_eq!(starts, vec![50_000, 1_000, 1_000]);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let segments = vec![shot(i64::MIN, i64::MAX)];
        let boundaries = filter_boundaries(&segments);
        assert_eq!(
            boundaries,
            vec![ShotBoundary { start_ms: i64::MIN, stop_ms: i64::MIN + MAX_CLIP_DURATION_MS }]
        );
        assert_eq!(segments[0].duration_ms(), i64::MAX);
    }
}
