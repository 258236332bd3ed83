//! Postgres store integration tests.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p clipqa-store -- --ignored`.
//! Each test truncates the tables, so they run serially.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serial_test::serial;

use clipqa_models::{
    ClipArtifact, ClipId, LockPolicy, NavigationCursor, ShotBoundary, Verdict, Video, VideoId,
    VideoStatus,
};
use clipqa_store::{
    ClipFilter, ClipStore, DecisionFilter, PgStore, ReviewStore, StoreConfig, StoreError, VideoStore,
};

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";

async fn fresh_store() -> PgStore {
    let config = StoreConfig::from_env().expect("DATABASE_URL must be set");
    let store = PgStore::connect(&config).await.expect("connect");
    store.migrate().await.expect("migrate");
    sqlx::query("TRUNCATE clips, videos RESTART IDENTITY CASCADE")
        .execute(store.pool())
        .await
        .expect("truncate");
    store
}

async fn seed_uploaded_clips(store: &PgStore, count: i64) -> Vec<ClipId> {
    let now = Utc::now();
    store
        .insert_video(&Video::ready("v1", "https://cdn.example/v1.mp4", now))
        .await
        .unwrap();
    let boundaries: Vec<ShotBoundary> = (0..count)
        .map(|i| ShotBoundary {
            start_ms: i * 30_000,
            stop_ms: i * 30_000 + 12_000,
        })
        .collect();
    let clips = store
        .insert_clips(&VideoId::from("v1"), &boundaries, now)
        .await
        .unwrap();
    for clip in &clips {
        store
            .set_artifact(clip.id, ClipArtifact::DriveClip, "https://drive.example/x", now)
            .await
            .unwrap();
    }
    clips.iter().map(|c| c.id).collect()
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_claims_hand_out_one_video() {
    let store = Arc::new(fresh_store().await);
    store
        .insert_video(&Video::ready("only", "https://cdn.example/only.mp4", Utc::now()))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.claim_next_ready(Utc::now()).await }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(video) = handle.await.unwrap().unwrap() {
            claimed.push(video);
        }
    }
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, VideoStatus::Ready);

    let stored = store.get_video(&VideoId::from("only")).await.unwrap().unwrap();
    assert_eq!(stored.status, VideoStatus::Processing);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_video_reset() {
    let store = fresh_store().await;
    let id = VideoId::from("v9");
    let now = Utc::now();
    store
        .insert_video(&Video::ready("v9", "https://cdn.example/v9.mp4", now))
        .await
        .unwrap();

    assert!(matches!(store.reset_failed(&id, now).await, Err(StoreError::Validation(_))));
    assert!(matches!(
        store.reset_failed(&VideoId::from("nope"), now).await,
        Err(StoreError::NotFound(_))
    ));

    store.mark_failed(&id, "detector returned no job id", now).await.unwrap();
    let video = store.get_video(&id).await.unwrap().unwrap();
    assert_eq!(video.error.as_deref(), Some("detector returned no job id"));

    let reset = store.reset_failed(&id, now).await.unwrap();
    assert_eq!(reset.status, VideoStatus::Ready);
    assert!(reset.error.is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_navigate_wraps_and_locks() {
    let store = fresh_store().await;
    let ids = seed_uploaded_clips(&store, 3).await;
    let policy = LockPolicy::default();
    let now = Utc::now();

    let next = store
        .navigate(NavigationCursor::After(ids[2]), ALICE, now, &policy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.clip.id, ids[0]);
    assert_eq!(next.clip.qa_locked_by.as_deref(), Some(ALICE));
    assert!(next.video.is_some());

    let prev = store
        .navigate(NavigationCursor::Before(ids[0]), ALICE, now, &policy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prev.clip.id, ids[2]);

    // Bob cannot see either of Alice's clips
    let bob = store
        .navigate(NavigationCursor::First, BOB, now, &policy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.clip.id, ids[1]);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_lock_exclusivity_and_expiry() {
    let store = fresh_store().await;
    let ids = seed_uploaded_clips(&store, 1).await;
    let policy = LockPolicy::new(Duration::minutes(5));
    let now = Utc::now();

    store.navigate(NavigationCursor::First, ALICE, now, &policy).await.unwrap().unwrap();

    assert!(matches!(
        store.resolve(ids[0], Verdict::Pass, None, BOB, now).await,
        Err(StoreError::LockedByAnotherUser { .. })
    ));
    assert!(matches!(
        store.skip(ids[0], "no audio", BOB, now).await,
        Err(StoreError::LockedByAnotherUser { .. })
    ));

    let later = now + Duration::minutes(6);
    let taken = store
        .navigate(NavigationCursor::First, BOB, later, &policy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(taken.clip.qa_locked_by.as_deref(), Some(BOB));

    assert!(!store.unlock(ids[0], ALICE, later).await.unwrap());
    assert!(store.unlock(ids[0], BOB, later).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_resolve_clears_skip_and_stats() {
    let store = fresh_store().await;
    let ids = seed_uploaded_clips(&store, 3).await;
    let policy = LockPolicy::default();
    let now = Utc::now();

    store.skip(ids[0], "wrong language", ALICE, now).await.unwrap();
    let resolved = store.resolve(ids[0], Verdict::Pass, None, ALICE, now).await.unwrap();
    assert!(!resolved.is_skipped);
    assert!(resolved.skip_reason.is_none());

    store.resolve(ids[1], Verdict::Fail, Some("cut mid-word".into()), ALICE, now).await.unwrap();

    let stats = store.stats(now, &policy).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.passed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.success_rate, 50.0);

    let undecided = store
        .list_clips(&ClipFilter {
            decision: Some(DecisionFilter::Undecided),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(undecided.pagination.total, 1);
    assert_eq!(undecided.clips[0].id, ids[2]);
}
