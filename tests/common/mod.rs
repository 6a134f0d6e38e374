// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, TimeZone, Utc};
use route_sync::config::Config;
use route_sync::db::{MemoryRouteStore, MemoryWatermarkStore, WatermarkStore};
use route_sync::models::{ActivityType, TracePoint, WorkoutRecord};
use route_sync::routes::create_router;
use route_sync::services::{InMemorySource, SyncCoordinator, SyncSettings};
use route_sync::AppState;
use std::sync::Arc;

pub type TestCoordinator = SyncCoordinator<InMemorySource, MemoryRouteStore>;

/// Coordinator wired to in-memory collaborators the test can poke at.
#[allow(dead_code)]
pub struct Harness {
    pub source: Arc<InMemorySource>,
    pub store: Arc<MemoryRouteStore>,
    pub watermark: Arc<MemoryWatermarkStore>,
    pub sync: Arc<TestCoordinator>,
}

/// Settings small enough for tests.
#[allow(dead_code)]
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        concurrency: 4,
        tolerance_meters: 10.0,
        deadline: std::time::Duration::from_secs(5),
        lookback: std::time::Duration::from_secs(24 * 3600),
    }
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(test_settings())
}

#[allow(dead_code)]
pub fn harness_with(settings: SyncSettings) -> Harness {
    let source = Arc::new(InMemorySource::new());
    let store = Arc::new(MemoryRouteStore::new());
    let watermark = Arc::new(MemoryWatermarkStore::new());
    let sync = Arc::new(
        SyncCoordinator::new(
            Arc::clone(&source),
            Arc::clone(&store),
            Arc::clone(&watermark) as Arc<dyn WatermarkStore>,
            settings,
        )
        .expect("coordinator should start"),
    );

    Harness {
        source,
        store,
        watermark,
        sync,
    }
}

/// Create a test app backed by in-memory collaborators.
/// Returns the router and the harness behind it.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Harness) {
    let harness = harness();
    let state = Arc::new(AppState::new(Config::default(), Arc::clone(&harness.sync)));
    (create_router(state), harness)
}

/// Fixed reference instant used across tests.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn workout(id: &str, activity_type: ActivityType, start: DateTime<Utc>) -> WorkoutRecord {
    WorkoutRecord {
        external_id: id.to_string(),
        activity_type,
        start_date: start,
        end_date: start + Duration::minutes(40),
        distance_meters: Some(5_000.0),
        duration_seconds: Some(2_400.0),
        calories_kcal: Some(350.0),
        is_indoor: false,
    }
}

#[allow(dead_code)]
pub fn indoor_workout(id: &str, start: DateTime<Utc>) -> WorkoutRecord {
    WorkoutRecord {
        is_indoor: true,
        ..workout(id, ActivityType::Cycling, start)
    }
}

/// Northbound trace along longitude 0, one fix per second.
///
/// `step_deg` of 0.0001 is roughly 11 m between fixes.
#[allow(dead_code)]
pub fn straight_trace(start: DateTime<Utc>, n: usize, step_deg: f64) -> Vec<TracePoint> {
    (0..n)
        .map(|i| TracePoint::new(i as f64 * step_deg, 0.0, start + Duration::seconds(i as i64)))
        .collect()
}

/// Wiggly trace for exercising the simplifiers.
#[allow(dead_code)]
pub fn wiggly_trace(start: DateTime<Utc>, n: usize) -> Vec<TracePoint> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            TracePoint::new(
                37.4 + x * 0.00007 + (x * 0.37).sin() * 0.0002,
                -122.1 + (x * 0.11).cos() * 0.0003,
                start + Duration::seconds(i as i64),
            )
        })
        .collect()
}
