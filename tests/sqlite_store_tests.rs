// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-disk route store and watermark file behavior.

use chrono::Duration;
use route_sync::db::{FileWatermarkStore, RouteStore, SqliteRouteStore, WatermarkStore};
use route_sync::error::StoreError;
use route_sync::models::ActivityType;
use tempfile::TempDir;

mod common;

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("routes.db");
    let t = common::t0();

    {
        let store = SqliteRouteStore::open(&path).unwrap();
        let mut ctx = store.begin();
        let h = ctx.upsert_workout(common::workout("w-1", ActivityType::Hiking, t));
        ctx.append_route_points(&h, &common::straight_trace(t, 6, 0.001))
            .unwrap();
        let summary = store.commit(ctx).await.unwrap();
        assert_eq!(summary.workouts, 1);
        assert_eq!(summary.points, 6);
    }

    let reopened = SqliteRouteStore::open(&path).unwrap();
    assert_eq!(reopened.workout_count().await.unwrap(), 1);
    let workouts = reopened.fetch_all(None).await.unwrap();
    assert_eq!(workouts[0], common::workout("w-1", ActivityType::Hiking, t));

    let points = reopened.route_points("w-1").await.unwrap();
    assert_eq!(points.len(), 6);
    assert!(points.iter().all(|p| p.workout_id == "w-1"));
    assert_eq!(
        points.iter().map(|p| p.sequence).collect::<Vec<_>>(),
        (0..6).collect::<Vec<u32>>()
    );
}

#[tokio::test]
async fn test_duplicate_upsert_keeps_one_record() {
    let store = SqliteRouteStore::in_memory().unwrap();
    let t = common::t0();

    let mut ctx = store.begin();
    let first = ctx.upsert_workout(common::workout("dup", ActivityType::Running, t));
    let mut updated = common::workout("dup", ActivityType::Running, t);
    updated.distance_meters = Some(6_200.0);
    let second = ctx.upsert_workout(updated.clone());
    assert_eq!(first, second);
    assert_eq!(ctx.len(), 1);
    store.commit(ctx).await.unwrap();

    // A later cycle updates the same row.
    let mut ctx = store.begin();
    updated.calories_kcal = Some(410.0);
    ctx.upsert_workout(updated.clone());
    store.commit(ctx).await.unwrap();

    assert_eq!(store.fetch_all(None).await.unwrap(), vec![updated]);
}

#[tokio::test]
async fn test_split_appends_continue_sequence() {
    let store = SqliteRouteStore::in_memory().unwrap();
    let t = common::t0();
    let trace = common::straight_trace(t, 8, 0.001);

    let mut ctx = store.begin();
    let h = ctx.upsert_workout(common::workout("w", ActivityType::Cycling, t));
    assert_eq!(ctx.append_route_points(&h, &trace[..3]).unwrap(), 3);
    assert_eq!(ctx.append_route_points(&h, &trace[3..]).unwrap(), 5);
    assert_eq!(ctx.point_count(), 8);
    store.commit(ctx).await.unwrap();

    let points = store.route_points("w").await.unwrap();
    assert_eq!(
        points.iter().map(|p| p.sequence).collect::<Vec<_>>(),
        (0..8).collect::<Vec<u32>>()
    );
    assert_eq!(points[7].timestamp, trace[7].timestamp);
}

#[tokio::test]
async fn test_metadata_only_recommit_keeps_points() {
    let store = SqliteRouteStore::in_memory().unwrap();
    let t = common::t0();

    let mut ctx = store.begin();
    let h = ctx.upsert_workout(common::workout("w", ActivityType::Walking, t));
    ctx.append_route_points(&h, &common::straight_trace(t, 4, 0.001))
        .unwrap();
    store.commit(ctx).await.unwrap();

    let mut ctx = store.begin();
    ctx.upsert_workout(common::workout("w", ActivityType::Walking, t));
    let summary = store.commit(ctx).await.unwrap();
    assert_eq!(summary.points, 0);

    assert_eq!(store.route_points("w").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_foreign_handle_rejected() {
    let store = SqliteRouteStore::in_memory().unwrap();
    let t = common::t0();

    let mut other = store.begin();
    let foreign = other.upsert_workout(common::workout("elsewhere", ActivityType::Running, t));

    let mut ctx = store.begin();
    let err = ctx
        .append_route_points(&foreign, &common::straight_trace(t, 2, 0.001))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownHandle(_)));
    assert!(ctx.is_empty());
}

#[tokio::test]
async fn test_empty_commit_is_noop() {
    let store = SqliteRouteStore::in_memory().unwrap();
    let summary = store.commit(store.begin()).await.unwrap();
    assert_eq!(summary.workouts, 0);
    assert_eq!(store.workout_count().await.unwrap(), 0);
    assert!(store.route_points("missing").await.unwrap().is_empty());
}

#[test]
fn test_watermark_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = FileWatermarkStore::new(dir.path().join("settings.json"));
    assert_eq!(store.load().unwrap(), None);

    store.save(common::t0()).unwrap();
    store.save(common::t0() + Duration::hours(2)).unwrap();

    let reopened = FileWatermarkStore::new(dir.path().join("settings.json"));
    assert_eq!(reopened.load().unwrap(), Some(common::t0() + Duration::hours(2)));
    assert!(!dir.path().join("settings.json.tmp").exists());
}

#[test]
fn test_corrupt_watermark_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, b"not json").unwrap();

    let store = FileWatermarkStore::new(&path);
    assert!(matches!(store.load(), Err(StoreError::Io(_))));
}
