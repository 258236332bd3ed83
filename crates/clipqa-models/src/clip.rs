//! Clip records and review outcomes.

use chrono::{DateTime, Utc};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::boundary::ShotBoundary;
use crate::error::ModelError;
use crate::review::LockPolicy;
use crate::VideoId;

/// Database identifier of a clip.
///
/// Serialized as a JSON string because ids can exceed the 2^53 range that
/// JavaScript numbers represent exactly. Both strings and integers are
/// accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClipId(pub i64);

impl ClipId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClipId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ClipId)
            .map_err(|_| ModelError::InvalidClipId(s.to_string()))
    }
}

impl From<i64> for ClipId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Serialize for ClipId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClipId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Number(n) => Ok(ClipId(n)),
        }
    }
}

impl JsonSchema for ClipId {
    fn schema_name() -> String {
        "ClipId".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Reviewer verdict for a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn from_passed(is_passed: bool) -> Self {
        if is_passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Review state of a clip.
///
/// The store keeps this flattened into `is_passed` / `is_skipped` /
/// `skip_reason`; everything that reasons about review state goes through
/// this enum instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Pending,
    Passed,
    Failed,
    Skipped { reason: String },
}

impl ReviewOutcome {
    /// Rebuild from the persisted columns.
    pub fn from_columns(is_passed: Option<bool>, is_skipped: bool, skip_reason: Option<&str>) -> Self {
        if is_skipped {
            return ReviewOutcome::Skipped {
                reason: skip_reason.unwrap_or_default().to_string(),
            };
        }
        match is_passed {
            None => ReviewOutcome::Pending,
            Some(true) => ReviewOutcome::Passed,
            Some(false) => ReviewOutcome::Failed,
        }
    }

    /// Persisted `(is_passed, is_skipped, skip_reason)` columns.
    pub fn to_columns(&self) -> (Option<bool>, bool, Option<String>) {
        match self {
            ReviewOutcome::Pending => (None, false, None),
            ReviewOutcome::Passed => (Some(true), false, None),
            ReviewOutcome::Failed => (Some(false), false, None),
            ReviewOutcome::Skipped { reason } => (None, true, Some(reason.clone())),
        }
    }

    /// True once a reviewer has passed or failed the clip.
    pub fn is_decided(&self) -> bool {
        matches!(self, ReviewOutcome::Passed | ReviewOutcome::Failed)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReviewOutcome::Pending)
    }
}

impl From<Verdict> for ReviewOutcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => ReviewOutcome::Passed,
            Verdict::Fail => ReviewOutcome::Failed,
        }
    }
}

/// Artifact columns populated by the cut/upload step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipArtifact {
    /// Shareable file-hosting link (gates review eligibility)
    DriveClip,
    /// Object storage link to the cut clip
    ClipFile,
    /// Object storage link to the XML sidecar
    Sidecar,
}

impl ClipArtifact {
    /// Column backing this artifact.
    pub fn column(&self) -> &'static str {
        match self {
            ClipArtifact::DriveClip => "drive_clip_url",
            ClipArtifact::ClipFile => "clip_path",
            ClipArtifact::Sidecar => "xml_path",
        }
    }
}

/// A clip cut from a source video, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: ClipId,
    #[serde(rename = "videoID")]
    pub video_id: VideoId,

    /// Clip start within the source, milliseconds
    pub start_ms: i64,
    /// Clip end within the source, milliseconds
    pub end_ms: i64,

    pub drive_clip_url: Option<String>,
    pub clip_path: Option<String>,
    pub xml_path: Option<String>,

    pub is_passed: Option<bool>,
    pub is_skipped: bool,
    pub skip_reason: Option<String>,
    pub skipped_by: Option<String>,
    pub skipped_at: Option<DateTime<Utc>>,

    pub qa_locked_by: Option<String>,
    pub qa_locked_at: Option<DateTime<Utc>>,
    pub qa_comment: Option<String>,
    pub qa_completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Clip {
    /// Fresh clip for a boundary: no artifacts, undecided, unlocked.
    pub fn materialized(id: ClipId, video_id: VideoId, boundary: ShotBoundary, now: DateTime<Utc>) -> Self {
        Self {
            id,
            video_id,
            start_ms: boundary.start_ms,
            end_ms: boundary.stop_ms,
            drive_clip_url: None,
            clip_path: None,
            xml_path: None,
            is_passed: None,
            is_skipped: false,
            skip_reason: None,
            skipped_by: None,
            skipped_at: None,
            qa_locked_by: None,
            qa_locked_at: None,
            qa_comment: None,
            qa_completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn outcome(&self) -> ReviewOutcome {
        ReviewOutcome::from_columns(self.is_passed, self.is_skipped, self.skip_reason.as_deref())
    }

    /// Whether the clip has been uploaded to the review host.
    pub fn is_uploaded(&self) -> bool {
        self.drive_clip_url.is_some()
    }

    /// Reviewer holding an unexpired lock, if any.
    pub fn active_lock_holder(&self, now: DateTime<Utc>, policy: &LockPolicy) -> Option<&str> {
        let holder = self.qa_locked_by.as_deref()?;
        if policy.is_expired(self.qa_locked_at, now) {
            None
        } else {
            Some(holder)
        }
    }

    /// The reviewable predicate: uploaded, pending, and either unlocked,
    /// locked by `requester`, or holding an expired lock.
    pub fn is_reviewable_by(&self, requester: &str, now: DateTime<Utc>, policy: &LockPolicy) -> bool {
        if !self.is_uploaded() || !self.outcome().is_pending() {
            return false;
        }
        match self.active_lock_holder(now, policy) {
            None => true,
            Some(holder) => holder == requester,
        }
    }

    /// True when `requester` may not act on this clip because someone else's
    /// name is on the lock. Expiry is not consulted here.
    pub fn is_locked_by_other(&self, requester: &str) -> bool {
        matches!(self.qa_locked_by.as_deref(), Some(holder) if holder != requester)
    }

    pub fn lock(&mut self, requester: &str, now: DateTime<Utc>) {
        self.qa_locked_by = Some(requester.to_string());
        self.qa_locked_at = Some(now);
        self.updated_at = now;
    }

    pub fn release_lock(&mut self) {
        self.qa_locked_by = None;
        self.qa_locked_at = None;
    }

    /// Record a verdict. Clears any earlier skip and releases the lock.
    pub fn resolve(&mut self, verdict: Verdict, comment: Option<String>, now: DateTime<Utc>) {
        let (is_passed, is_skipped, skip_reason) = ReviewOutcome::from(verdict).to_columns();
        self.is_passed = is_passed;
        self.is_skipped = is_skipped;
        self.skip_reason = skip_reason;
        self.skipped_by = None;
        self.skipped_at = None;
        self.qa_comment = comment;
        self.qa_completed_at = Some(now);
        self.release_lock();
        self.updated_at = now;
    }

    /// Mark the clip skipped by `requester` and release the lock.
    pub fn skip(&mut self, reason: &str, requester: &str, now: DateTime<Utc>) {
        self.is_skipped = true;
        self.skip_reason = Some(reason.to_string());
        self.skipped_by = Some(requester.to_string());
        self.skipped_at = Some(now);
        self.release_lock();
        self.updated_at = now;
    }

    pub fn set_artifact(&mut self, artifact: ClipArtifact, url: String, now: DateTime<Utc>) {
        match artifact {
            ClipArtifact::DriveClip => self.drive_clip_url = Some(url),
            ClipArtifact::ClipFile => self.clip_path = Some(url),
            ClipArtifact::Sidecar => self.xml_path = Some(url),
        }
        self.updated_at = now;
    }
}
