//! Review queue rules: lock expiry, navigation order, and statistics.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clip::{Clip, ClipId, ReviewOutcome};
use crate::error::ModelError;

/// Default reviewer lock lifetime.
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 300;

/// Expiry rule for reviewer locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub timeout: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LOCK_TIMEOUT_SECS))
    }
}

impl LockPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs.min(i64::MAX as u64) as i64))
    }

    /// Locks stamped before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.timeout
    }

    /// A lock without a timestamp counts as expired.
    pub fn is_expired(&self, locked_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match locked_at {
            Some(at) => at < self.cutoff(now),
            None => true,
        }
    }

    pub fn expires_at(&self, locked_at: DateTime<Utc>) -> DateTime<Utc> {
        locked_at + self.timeout
    }
}

/// Paging direction through the review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Prev => "prev",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "next" => Ok(Direction::Next),
            "prev" | "previous" => Ok(Direction::Prev),
            _ => Err(ModelError::InvalidDirection(s.to_string())),
        }
    }
}

/// Where a navigate request starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationCursor {
    /// Earliest-created reviewable clip
    First,
    /// Smallest id above this one, wrapping to the smallest
    After(ClipId),
    /// Largest id below this one, wrapping to the largest
    Before(ClipId),
}

impl NavigationCursor {
    /// A position needs both a current id and a direction; anything less
    /// starts from the front of the queue.
    pub fn from_request(current_id: Option<ClipId>, direction: Option<Direction>) -> Self {
        match (current_id, direction) {
            (Some(id), Some(Direction::Next)) => NavigationCursor::After(id),
            (Some(id), Some(Direction::Prev)) => NavigationCursor::Before(id),
            _ => NavigationCursor::First,
        }
    }
}

/// Pick the navigation target among already-filtered reviewable clips.
///
/// The store-backed implementations encode the same ordering in SQL; this is
/// the reference used by the in-process store.
pub fn pick_target<'a, I>(candidates: I, cursor: NavigationCursor) -> Option<&'a Clip>
where
    I: IntoIterator<Item = &'a Clip>,
{
    let candidates: Vec<&Clip> = candidates.into_iter().collect();
    match cursor {
        NavigationCursor::First => candidates
            .into_iter()
            .min_by_key(|clip| (clip.created_at, clip.id)),
        NavigationCursor::After(current) => {
            let wrapped = candidates.iter().copied().min_by_key(|clip| clip.id);
            candidates
                .into_iter()
                .filter(|clip| clip.id > current)
                .min_by_key(|clip| clip.id)
                .or(wrapped)
        }
        NavigationCursor::Before(current) => {
            let wrapped = candidates.iter().copied().max_by_key(|clip| clip.id);
            candidates
                .into_iter()
                .filter(|clip| clip.id < current)
                .max_by_key(|clip| clip.id)
                .or(wrapped)
        }
    }
}

/// Aggregate review counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total: i64,
    pub uploaded: i64,
    pub passed: i64,
    pub failed: i64,
    /// Reviewable and not held by an unexpired lock
    pub pending: i64,
    /// Held by an unexpired lock and still undecided
    pub locked: i64,
    pub skipped: i64,
    /// Percentage of decided clips that passed, two decimals
    pub success_rate: f64,
}

impl ReviewStats {
    /// Build from raw counters, deriving the success rate.
    #[allow(clippy::too_many_arguments)]
    pub fn from_counts(
        total: i64,
        uploaded: i64,
        passed: i64,
        failed: i64,
        pending: i64,
        locked: i64,
        skipped: i64,
    ) -> Self {
        Self {
            total,
            uploaded,
            passed,
            failed,
            pending,
            locked,
            skipped,
            success_rate: success_rate(passed, failed),
        }
    }

    pub fn from_clips<'a, I>(clips: I, now: DateTime<Utc>, policy: &LockPolicy) -> Self
    where
        I: IntoIterator<Item = &'a Clip>,
    {
        let mut stats = ReviewStats::default();
        for clip in clips {
            stats.total += 1;
            if clip.is_uploaded() {
                stats.uploaded += 1;
            }
            match clip.outcome() {
                ReviewOutcome::Passed => stats.passed += 1,
                ReviewOutcome::Failed => stats.failed += 1,
                ReviewOutcome::Skipped { .. } => stats.skipped += 1,
                ReviewOutcome::Pending => {
                    if clip.active_lock_holder(now, policy).is_some() {
                        stats.locked += 1;
                    } else if clip.is_uploaded() {
                        stats.pending += 1;
                    }
                }
            }
        }
        stats.success_rate = success_rate(stats.passed, stats.failed);
        stats
    }
}

/// `passed / (passed + failed)` as a percentage rounded to two decimals.
pub fn success_rate(passed: i64, failed: i64) -> f64 {
    let decided = passed + failed;
    if decided <= 0 {
        return 0.0;
    }
    let pct = passed as f64 * 100.0 / decided as f64;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ShotBoundary;
    use crate::clip::Verdict;
    use crate::VideoId;

    fn clip(id: i64, created_offset_secs: i64) -> Clip {
        let base = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut clip = Clip::materialized(
            ClipId(id),
            VideoId::from("v1"),
            ShotBoundary { start_ms: 0, stop_ms: 10_000 },
            base + Duration::seconds(created_offset_secs),
        );
        clip.drive_clip_url = Some(format!("https://drive.example/{id}"));
        clip
    }

    #[test]
    fn test_next_wraps_to_smallest_id() {
        let clips = vec![clip(1, 0), clip(3, 1), clip(7, 2)];
        let target = pick_target(&clips, NavigationCursor::After(ClipId(7))).unwrap();
        assert_eq!(target.id, ClipId(1));

        let target = pick_target(&clips, NavigationCursor::After(ClipId(1))).unwrap();
        assert_eq!(target.id, ClipId(3));
    }

    #[test]
    fn test_prev_wraps_to_largest_id() {
        let clips = vec![clip(1, 0), clip(3, 1), clip(7, 2)];
        let target = pick_target(&clips, NavigationCursor::Before(ClipId(1))).unwrap();
        assert_eq!(target.id, ClipId(7));

        let target = pick_target(&clips, NavigationCursor::Before(ClipId(7))).unwrap();
        assert_eq!(target.id, ClipId(3));
    }

    #[test]
    fn test_first_uses_creation_order() {
        let clips = vec![clip(1, 50), clip(3, 10), clip(7, 20)];
        let target = pick_target(&clips, NavigationCursor::First).unwrap();
        assert_eq!(target.id, ClipId(3));
    }

    #[test]
    fn test_empty_queue_has_no_target() {
        let clips: Vec<Clip> = Vec::new();
        assert!(pick_target(&clips, NavigationCursor::After(ClipId(4))).is_none());
    }

    #[test]
    fn test_cursor_requires_id_and_direction() {
        assert_eq!(NavigationCursor::from_request(None, Some(Direction::Next)), NavigationCursor::First);
        assert_eq!(NavigationCursor::from_request(Some(ClipId(2)), None), NavigationCursor::First);
        assert_eq!(
            NavigationCursor::from_request(Some(ClipId(2)), Some(Direction::Prev)),
            NavigationCursor::Before(ClipId(2))
        );
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("next".parse::<Direction>().unwrap(), Direction::Next);
        assert_eq!("PREV".parse::<Direction>().unwrap(), Direction::Prev);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_missing_lock_timestamp_is_expired() {
        let policy = LockPolicy::default();
        assert!(policy.is_expired(None, Utc::now()));
    }

    #[test]
    fn test_success_rate_ignores_undecided() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(2, 1), 66.67);
        assert_eq!(success_rate(3, 0), 100.0);
    }

    #[test]
    fn test_stats_from_clips() {
        let policy = LockPolicy::default();
        let now = Utc::now();

        let mut passed = clip(1, 0);
        passed.resolve(Verdict::Pass, None, now);
        let mut failed = clip(2, 0);
        failed.resolve(Verdict::Fail, None, now);
        let mut skipped = clip(3, 0);
        skipped.skip("corrupt", "a@example.com", now);
        let mut locked = clip(4, 0);
        locked.lock("a@example.com", now);
        let mut stale = clip(5, 0);
        stale.lock("a@example.com", now - Duration::hours(1));
        let pending = clip(6, 0);
        let mut not_uploaded = clip(7, 0);
        not_uploaded.drive_clip_url = None;

        let clips = vec![passed, failed, skipped, locked, stale, pending, not_uploaded];
        let stats = ReviewStats::from_clips(&clips, now, &policy);

        assert_eq!(stats.total, 7);
        assert_eq!(stats.uploaded, 6);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.locked, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.success_rate, 50.0);
    }
}
