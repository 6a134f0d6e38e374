// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory route store for tests and local runs.

use super::{CommitSummary, RouteStore, WriteContext};
use crate::error::StoreError;
use crate::models::{RoutePoint, WorkoutPredicate, WorkoutRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    workouts: HashMap<String, WorkoutRecord>,
    points: HashMap<String, Vec<RoutePoint>>,
}

/// Route store backed by hash maps.
///
/// Commits are atomic with respect to readers: the whole context is applied
/// under one write lock.
#[derive(Default)]
pub struct MemoryRouteStore {
    tables: RwLock<Tables>,
    fail_next_commit: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with `StoreError::Io` without writing.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Total route points across all workouts.
    pub async fn total_points(&self) -> usize {
        self.tables.read().await.points.values().map(Vec::len).sum()
    }
}

impl RouteStore for MemoryRouteStore {
    async fn fetch_all(
        &self,
        predicate: Option<&WorkoutPredicate>,
    ) -> Result<Vec<WorkoutRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut workouts: Vec<WorkoutRecord> = tables
            .workouts
            .values()
            .filter(|w| predicate.map_or(true, |p| p.matches(w.start_date, w.activity_type)))
            .cloned()
            .collect();

        workouts.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        Ok(workouts)
    }

    async fn route_points(&self, workout_id: &str) -> Result<Vec<RoutePoint>, StoreError> {
        let tables = self.tables.read().await;
        let mut points = tables.points.get(workout_id).cloned().unwrap_or_default();
        points.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        Ok(points)
    }

    async fn workout_count(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read().await.workouts.len())
    }

    async fn commit(&self, ctx: WriteContext) -> Result<CommitSummary, StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io("injected commit failure".to_string()));
        }

        let mut summary = CommitSummary::default();
        let mut tables = self.tables.write().await;
        for staged in ctx.into_staged() {
            let id = staged.record.external_id.clone();
            tables.workouts.insert(id.clone(), staged.record);
            summary.workouts += 1;
            if !staged.points.is_empty() {
                summary.points += staged.points.len();
                tables.points.insert(id, staged.points);
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityType, TracePoint};
    use chrono::{Duration, TimeZone, Utc};

    fn record(id: &str, day: u32) -> WorkoutRecord {
        let start = Utc.with_ymd_and_hms(2024, 7, day, 9, 0, 0).unwrap();
        WorkoutRecord {
            external_id: id.to_string(),
            activity_type: ActivityType::Hiking,
            start_date: start,
            end_date: start + Duration::hours(2),
            distance_meters: None,
            duration_seconds: None,
            calories_kcal: None,
            is_indoor: false,
        }
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let store = MemoryRouteStore::new();
        store.fail_next_commit();

        let mut ctx = store.begin();
        ctx.upsert_workout(record("w-1", 1));
        assert!(store.commit(ctx).await.is_err());
        assert_eq!(store.workout_count().await.unwrap(), 0);
        assert_eq!(store.commit_count(), 0);

        // Only the next commit fails.
        let mut ctx = store.begin();
        ctx.upsert_workout(record("w-1", 1));
        store.commit(ctx).await.unwrap();
        assert_eq!(store.workout_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_point_set_keeps_existing_points() {
        let store = MemoryRouteStore::new();
        let t = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();

        let mut ctx = store.begin();
        let h = ctx.upsert_workout(record("w-1", 1));
        ctx.append_route_points(&h, &[TracePoint::new(1.0, 1.0, t)])
            .unwrap();
        store.commit(ctx).await.unwrap();

        let mut ctx = store.begin();
        ctx.upsert_workout(record("w-1", 1));
        store.commit(ctx).await.unwrap();

        assert_eq!(store.route_points("w-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_newest_first() {
        let store = MemoryRouteStore::new();
        let mut ctx = store.begin();
        ctx.upsert_workout(record("old", 1));
        ctx.upsert_workout(record("new", 5));
        store.commit(ctx).await.unwrap();

        let ids: Vec<String> = store
            .fetch_all(None)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.external_id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
