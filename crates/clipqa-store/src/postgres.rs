//! Postgres-backed record store.
//!
//! Query helpers take a generic `Executor` so they run against the pool or
//! inside a transaction. Every claim and lock is a single row-locking
//! statement; `SKIP LOCKED` keeps concurrent callers off each other's rows.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, FromRow, Postgres};
use tracing::{debug, info};

use clipqa_models::{
    Clip, ClipArtifact, ClipId, LockPolicy, NavigationCursor, ReviewStats, ShotBoundary, Verdict,
    Video, VideoId, VideoStatus,
};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::traits::{
    guard_foreign_lock, validate_skip_reason, ClipFilter, ClipPage, ClipStore, DecisionFilter,
    Pagination, ReviewAssignment, ReviewStore, VideoStore,
};

const VIDEO_COLUMNS: &str = "video_id, url, status, error, title, owner, resource_name, file_name, \
     duration_secs, ingest_date, broadcast_standard, created_at, updated_at";

const CLIP_COLUMNS: &str = "id, video_id, start_ms, end_ms, drive_clip_url, clip_path, xml_path, \
     is_passed, is_skipped, skip_reason, skipped_by, skipped_at, qa_locked_by, qa_locked_at, \
     qa_comment, qa_completed_at, created_at, updated_at";

/// Pending, uploaded, and not held by someone else's live lock.
/// `$1` is the requester, `$2` the expiry cutoff.
const REVIEWABLE_PREDICATE: &str = "drive_clip_url IS NOT NULL \
     AND is_passed IS NULL \
     AND is_skipped = FALSE \
     AND (qa_locked_by IS NULL OR qa_locked_by = $1 OR qa_locked_at IS NULL OR qa_locked_at < $2)";

#[derive(Debug, FromRow)]
struct VideoRow {
    video_id: String,
    url: String,
    status: String,
    error: Option<String>,
    title: Option<String>,
    owner: Option<String>,
    resource_name: Option<String>,
    file_name: Option<String>,
    duration_secs: Option<i64>,
    ingest_date: Option<String>,
    broadcast_standard: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VideoRow> for Video {
    type Error = StoreError;

    fn try_from(row: VideoRow) -> Result<Self, Self::Error> {
        Ok(Video {
            video_id: VideoId(row.video_id),
            url: row.url,
            status: row.status.parse()?,
            error: row.error,
            title: row.title,
            owner: row.owner,
            resource_name: row.resource_name,
            file_name: row.file_name,
            duration_secs: row.duration_secs,
            ingest_date: row.ingest_date,
            broadcast_standard: row.broadcast_standard,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ClipRow {
    id: i64,
    video_id: String,
    start_ms: i64,
    end_ms: i64,
    drive_clip_url: Option<String>,
    clip_path: Option<String>,
    xml_path: Option<String>,
    is_passed: Option<bool>,
    is_skipped: bool,
    skip_reason: Option<String>,
    skipped_by: Option<String>,
    skipped_at: Option<DateTime<Utc>>,
    qa_locked_by: Option<String>,
    qa_locked_at: Option<DateTime<Utc>>,
    qa_comment: Option<String>,
    qa_completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClipRow> for Clip {
    fn from(row: ClipRow) -> Self {
        Clip {
            id: ClipId(row.id),
            video_id: VideoId(row.video_id),
            start_ms: row.start_ms,
            end_ms: row.end_ms,
            drive_clip_url: row.drive_clip_url,
            clip_path: row.clip_path,
            xml_path: row.xml_path,
            is_passed: row.is_passed,
            is_skipped: row.is_skipped,
            skip_reason: row.skip_reason,
            skipped_by: row.skipped_by,
            skipped_at: row.skipped_at,
            qa_locked_by: row.qa_locked_by,
            qa_locked_at: row.qa_locked_at,
            qa_comment: row.qa_comment,
            qa_completed_at: row.qa_completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StatsRow {
    total: i64,
    uploaded: i64,
    passed: i64,
    failed: i64,
    pending: i64,
    locked: i64,
    skipped: i64,
}

/// Record store over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from config.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn observe<T>(operation: &'static str, started: Instant, result: &StoreResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_operation(operation, outcome, started.elapsed().as_secs_f64() * 1000.0);
}

/// Prefix every column in a list with a table alias.
fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|col| format!("{alias}.{}", col.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

// =============================================================================
// Query helpers
// =============================================================================

async fn fetch_video<'e, E>(executor: E, video_id: &VideoId) -> StoreResult<Option<Video>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE video_id = $1");
    let row: Option<VideoRow> = sqlx::query_as(&sql)
        .bind(video_id.as_str())
        .fetch_optional(executor)
        .await?;
    row.map(Video::try_from).transpose()
}

async fn claim_ready_video<'e, E>(executor: E, now: DateTime<Utc>) -> StoreResult<Option<Video>>
where
    E: Executor<'e, Database = Postgres>,
{
    // RETURNING reads from the CTE so the caller gets the pre-transition row.
    let returning = qualified(VIDEO_COLUMNS, "next");
    let sql = format!(
        r#"
        WITH next AS (
            SELECT {VIDEO_COLUMNS}
            FROM videos
            WHERE status = 'READY'
            ORDER BY created_at ASC, video_id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE videos v
        SET status = 'PROCESSING',
            updated_at = $1
        FROM next
        WHERE v.video_id = next.video_id
        RETURNING {returning}
        "#
    );
    let row: Option<VideoRow> = sqlx::query_as(&sql).bind(now).fetch_optional(executor).await?;
    row.map(Video::try_from).transpose()
}

async fn fetch_clip_for_update<'e, E>(executor: E, clip_id: ClipId) -> StoreResult<Clip>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("SELECT {CLIP_COLUMNS} FROM clips WHERE id = $1 FOR UPDATE");
    let row: Option<ClipRow> = sqlx::query_as(&sql)
        .bind(clip_id.get())
        .fetch_optional(executor)
        .await?;
    row.map(Clip::from)
        .ok_or_else(|| StoreError::not_found(format!("clip {}", clip_id)))
}

/// ORDER BY clause and anchor id for a navigation cursor.
///
/// `(id <= $4) ASC` sorts ids after the anchor first and the rest after them,
/// which is the wraparound.
fn navigation_order(cursor: NavigationCursor) -> (&'static str, Option<i64>) {
    match cursor {
        NavigationCursor::First => ("created_at ASC, id ASC", None),
        NavigationCursor::After(id) => ("(id <= $4) ASC, id ASC", Some(id.get())),
        NavigationCursor::Before(id) => ("(id >= $4) ASC, id DESC", Some(id.get())),
    }
}

async fn lock_next_reviewable<'e, E>(
    executor: E,
    cursor: NavigationCursor,
    requester: &str,
    now: DateTime<Utc>,
    policy: &LockPolicy,
) -> StoreResult<Option<Clip>>
where
    E: Executor<'e, Database = Postgres>,
{
    let (order_by, anchor) = navigation_order(cursor);
    let returning = qualified(CLIP_COLUMNS, "c");
    let sql = format!(
        r#"
        WITH target AS (
            SELECT id
            FROM clips
            WHERE {REVIEWABLE_PREDICATE}
            ORDER BY {order_by}
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE clips c
        SET qa_locked_by = $1,
            qa_locked_at = $3,
            updated_at = $3
        FROM target
        WHERE c.id = target.id
        RETURNING {returning}
        "#
    );

    let mut query = sqlx::query_as::<_, ClipRow>(&sql)
        .bind(requester)
        .bind(policy.cutoff(now))
        .bind(now);
    if let Some(anchor) = anchor {
        query = query.bind(anchor);
    }
    let row = query.fetch_optional(executor).await?;
    Ok(row.map(Clip::from))
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl VideoStore for PgStore {
    async fn insert_video(&self, video: &Video) -> StoreResult<()> {
        let started = Instant::now();
        let result = sqlx::query(
            r#"
            INSERT INTO videos (video_id, url, status, error, title, owner, resource_name,
                                file_name, duration_secs, ingest_date, broadcast_standard,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(video.video_id.as_str())
        .bind(&video.url)
        .bind(video.status.as_str())
        .bind(&video.error)
        .bind(&video.title)
        .bind(&video.owner)
        .bind(&video.resource_name)
        .bind(&video.file_name)
        .bind(video.duration_secs)
        .bind(&video.ingest_date)
        .bind(&video.broadcast_standard)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::validation(format!("video {} already exists", video.video_id))
            } else {
                StoreError::from(e)
            }
        });
        observe("insert_video", started, &result);
        result
    }

    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<Video>> {
        fetch_video(&self.pool, video_id).await
    }

    async fn claim_next_ready(&self, now: DateTime<Utc>) -> StoreResult<Option<Video>> {
        let started = Instant::now();
        let result = claim_ready_video(&self.pool, now).await;
        observe("claim_next_ready", started, &result);
        if let Ok(Some(video)) = &result {
            metrics::record_claim();
            debug!(video_id = %video.video_id, "Claimed READY video");
        }
        result
    }

    async fn mark_completed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<()> {
        let started = Instant::now();
        let result = sqlx::query(
            "UPDATE videos SET status = $2, error = NULL, updated_at = $3 WHERE video_id = $1",
        )
        .bind(video_id.as_str())
        .bind(VideoStatus::Completed.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)
        .and_then(|done| {
            if done.rows_affected() == 0 {
                Err(StoreError::not_found(format!("video {}", video_id)))
            } else {
                Ok(())
            }
        });
        observe("mark_completed", started, &result);
        result
    }

    async fn mark_failed(&self, video_id: &VideoId, message: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let started = Instant::now();
        let result = sqlx::query(
            "UPDATE videos SET status = $2, error = $3, updated_at = $4 WHERE video_id = $1",
        )
        .bind(video_id.as_str())
        .bind(VideoStatus::Failed.as_str())
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)
        .and_then(|done| {
            if done.rows_affected() == 0 {
                Err(StoreError::not_found(format!("video {}", video_id)))
            } else {
                Ok(())
            }
        });
        observe("mark_failed", started, &result);
        result
    }

    async fn reset_failed(&self, video_id: &VideoId, now: DateTime<Utc>) -> StoreResult<Video> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE videos SET status = 'READY', error = NULL, updated_at = $2 \
             WHERE video_id = $1 AND status = 'FAILED' RETURNING {VIDEO_COLUMNS}"
        );
        let row: Option<VideoRow> = sqlx::query_as(&sql)
            .bind(video_id.as_str())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

        let video = match row {
            Some(row) => Video::try_from(row)?,
            None => {
                let current = fetch_video(&mut *tx, video_id)
                    .await?
                    .ok_or_else(|| StoreError::not_found(format!("video {}", video_id)))?;
                return Err(StoreError::validation(format!(
                    "video {} is {}, only FAILED videos can be reset",
                    video_id, current.status
                )));
            }
        };
        tx.commit().await?;
        info!(video_id = %video_id, "Reset FAILED video to READY");
        Ok(video)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ClipStore for PgStore {
    async fn insert_clips(
        &self,
        video_id: &VideoId,
        boundaries: &[ShotBoundary],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Clip>> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if fetch_video(&mut *tx, video_id).await?.is_none() {
            return Err(StoreError::not_found(format!("video {}", video_id)));
        }

        let sql = format!(
            "INSERT INTO clips (video_id, start_ms, end_ms, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {CLIP_COLUMNS}"
        );
        let mut inserted = Vec::with_capacity(boundaries.len());
        for boundary in boundaries {
            if boundary.stop_ms <= boundary.start_ms {
                return Err(StoreError::validation(format!(
                    "empty clip range {}..{}",
                    boundary.start_ms, boundary.stop_ms
                )));
            }
            let row: ClipRow = sqlx::query_as(&sql)
                .bind(video_id.as_str())
                .bind(boundary.start_ms)
                .bind(boundary.stop_ms)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
            inserted.push(Clip::from(row));
        }
        tx.commit().await?;

        let result = Ok(inserted);
        observe("insert_clips", started, &result);
        result
    }

    async fn get_clip(&self, clip_id: ClipId) -> StoreResult<Option<Clip>> {
        let sql = format!("SELECT {CLIP_COLUMNS} FROM clips WHERE id = $1");
        let row: Option<ClipRow> = sqlx::query_as(&sql)
            .bind(clip_id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Clip::from))
    }

    async fn set_artifact(
        &self,
        clip_id: ClipId,
        artifact: ClipArtifact,
        url: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let started = Instant::now();
        // column names come from a closed enum
        let sql = format!(
            "UPDATE clips SET {} = $2, updated_at = $3 WHERE id = $1",
            artifact.column()
        );
        let result = sqlx::query(&sql)
            .bind(clip_id.get())
            .bind(url)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
            .and_then(|done| {
                if done.rows_affected() == 0 {
                    Err(StoreError::not_found(format!("clip {}", clip_id)))
                } else {
                    Ok(())
                }
            });
        observe("set_artifact", started, &result);
        result
    }

    async fn list_clips(&self, filter: &ClipFilter) -> StoreResult<ClipPage> {
        let filter = filter.clone().normalized();
        let passed_value = match filter.decision {
            Some(DecisionFilter::Passed) => Some(true),
            Some(DecisionFilter::Failed) => Some(false),
            _ => None,
        };
        let undecided_only = filter.decision == Some(DecisionFilter::Undecided);
        let video_id = filter.video_id.as_ref().map(|v| v.as_str().to_string());

        const WHERE: &str = "($1::text IS NULL OR video_id = $1) \
             AND ($2::boolean IS NULL OR is_passed = $2) \
             AND ($3 = FALSE OR is_passed IS NULL)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM clips WHERE {WHERE}"))
            .bind(&video_id)
            .bind(passed_value)
            .bind(undecided_only)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {CLIP_COLUMNS} FROM clips WHERE {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let rows: Vec<ClipRow> = sqlx::query_as(&sql)
            .bind(&video_id)
            .bind(passed_value)
            .bind(undecided_only)
            .bind(filter.limit as i64)
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(ClipPage {
            clips: rows.into_iter().map(Clip::from).collect(),
            pagination: Pagination::new(total, filter.page, filter.limit),
        })
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn navigate(
        &self,
        cursor: NavigationCursor,
        requester: &str,
        now: DateTime<Utc>,
        policy: &LockPolicy,
    ) -> StoreResult<Option<ReviewAssignment>> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let Some(clip) = lock_next_reviewable(&mut *tx, cursor, requester, now, policy).await? else {
            tx.commit().await?;
            let result = Ok(None);
            observe("navigate", started, &result);
            return result;
        };
        let video = fetch_video(&mut *tx, &clip.video_id).await?;
        tx.commit().await?;

        metrics::record_lock();
        debug!(clip_id = %clip.id, requester, "Locked clip for review");
        let result = Ok(Some(ReviewAssignment { clip, video }));
        observe("navigate", started, &result);
        result
    }

    async fn resolve(
        &self,
        clip_id: ClipId,
        verdict: Verdict,
        comment: Option<String>,
        requester: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Clip> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let current = fetch_clip_for_update(&mut *tx, clip_id).await?;
        guard_foreign_lock(&current, requester, "resolve")?;

        let sql = format!(
            r#"
            UPDATE clips
            SET is_passed = $2,
                qa_comment = $3,
                qa_completed_at = $4,
                qa_locked_by = NULL,
                qa_locked_at = NULL,
                is_skipped = FALSE,
                skip_reason = NULL,
                skipped_by = NULL,
                skipped_at = NULL,
                updated_at = $4
            WHERE id = $1
            RETURNING {CLIP_COLUMNS}
            "#
        );
        let row: ClipRow = sqlx::query_as(&sql)
            .bind(clip_id.get())
            .bind(verdict.is_passed())
            .bind(comment)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let result = Ok(Clip::from(row));
        observe("resolve", started, &result);
        result
    }

    async fn skip(&self, clip_id: ClipId, reason: &str, requester: &str, now: DateTime<Utc>) -> StoreResult<Clip> {
        let reason = validate_skip_reason(reason)?;
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let current = fetch_clip_for_update(&mut *tx, clip_id).await?;
        guard_foreign_lock(&current, requester, "skip")?;

        let sql = format!(
            r#"
            UPDATE clips
            SET is_skipped = TRUE,
                skip_reason = $2,
                skipped_by = $3,
                skipped_at = $4,
                qa_locked_by = NULL,
                qa_locked_at = NULL,
                updated_at = $4
            WHERE id = $1
            RETURNING {CLIP_COLUMNS}
            "#
        );
        let row: ClipRow = sqlx::query_as(&sql)
            .bind(clip_id.get())
            .bind(reason)
            .bind(requester)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        let result = Ok(Clip::from(row));
        observe("skip", started, &result);
        result
    }

    async fn unlock(&self, clip_id: ClipId, requester: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE clips
            SET qa_locked_by = NULL, qa_locked_at = NULL, updated_at = $3
            WHERE id = $1 AND qa_locked_by = $2
            "#,
        )
        .bind(clip_id.get())
        .bind(requester)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn stats(&self, now: DateTime<Utc>, policy: &LockPolicy) -> StoreResult<ReviewStats> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE drive_clip_url IS NOT NULL) AS uploaded,
                COUNT(*) FILTER (WHERE is_skipped = FALSE AND is_passed = TRUE) AS passed,
                COUNT(*) FILTER (WHERE is_skipped = FALSE AND is_passed = FALSE) AS failed,
                COUNT(*) FILTER (WHERE is_skipped = TRUE) AS skipped,
                COUNT(*) FILTER (
                    WHERE is_passed IS NULL AND is_skipped = FALSE
                      AND qa_locked_by IS NOT NULL AND qa_locked_at >= $1
                ) AS locked,
                COUNT(*) FILTER (
                    WHERE drive_clip_url IS NOT NULL AND is_passed IS NULL AND is_skipped = FALSE
                      AND NOT (qa_locked_by IS NOT NULL AND qa_locked_at IS NOT NULL AND qa_locked_at >= $1)
                ) AS pending
            FROM clips
            "#,
        )
        .bind(policy.cutoff(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(ReviewStats::from_counts(
            row.total,
            row.uploaded,
            row.passed,
            row.failed,
            row.pending,
            row.locked,
            row.skipped,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_columns() {
        assert_eq!(qualified("id, video_id", "c"), "c.id, c.video_id");
        assert!(qualified(CLIP_COLUMNS, "c").ends_with("c.updated_at"));
    }

    #[test]
    fn test_navigation_order_binds_anchor_only_when_positioned() {
        assert_eq!(navigation_order(NavigationCursor::First).1, None);
        assert_eq!(navigation_order(NavigationCursor::After(ClipId(7))), ("(id <= $4) ASC, id ASC", Some(7)));
        assert_eq!(navigation_order(NavigationCursor::Before(ClipId(1))), ("(id >= $4) ASC, id DESC", Some(1)));
    }
}
