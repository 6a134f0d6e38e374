// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route store layer.
//!
//! Writes are staged into a [`WriteContext`] and applied in one
//! [`RouteStore::commit`]. Reads go straight to the store.

pub mod memory;
pub mod sqlite;
pub mod watermark;

pub use memory::MemoryRouteStore;
pub use sqlite::SqliteRouteStore;
pub use watermark::{FileWatermarkStore, MemoryWatermarkStore, WatermarkStore};

use crate::error::StoreError;
use crate::models::{RoutePoint, TracePoint, WorkoutPredicate, WorkoutRecord};
use std::collections::HashMap;
use std::future::Future;

/// Table names as constants.
pub mod tables {
    pub const WORKOUTS: &str = "workouts";
    pub const ROUTE_POINTS: &str = "route_points";
}

/// Durable keyed storage for workouts and their route points.
pub trait RouteStore: Send + Sync + 'static {
    /// All stored workouts matching `predicate`, newest `start_date` first.
    fn fetch_all(
        &self,
        predicate: Option<&WorkoutPredicate>,
    ) -> impl Future<Output = Result<Vec<WorkoutRecord>, StoreError>> + Send;

    /// Route points for one workout in timestamp order.
    fn route_points(
        &self,
        workout_id: &str,
    ) -> impl Future<Output = Result<Vec<RoutePoint>, StoreError>> + Send;

    fn workout_count(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Start staging writes.
    fn begin(&self) -> WriteContext {
        WriteContext::default()
    }

    /// Apply everything staged in `ctx` atomically.
    ///
    /// A workout staged with a non-empty point set has its previously stored
    /// points replaced. A workout staged without points keeps the points it
    /// already had.
    fn commit(
        &self,
        ctx: WriteContext,
    ) -> impl Future<Output = Result<CommitSummary, StoreError>> + Send;
}

/// Reference to a workout staged in a particular [`WriteContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutHandle {
    index: usize,
    external_id: String,
}

impl WorkoutHandle {
    pub fn external_id(&self) -> &str {
        &self.external_id
    }
}

/// A workout and the points staged for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedWorkout {
    pub record: WorkoutRecord,
    pub points: Vec<RoutePoint>,
}

/// Pending writes for one sync cycle.
#[derive(Debug, Default)]
pub struct WriteContext {
    staged: Vec<StagedWorkout>,
    by_id: HashMap<String, usize>,
}

impl WriteContext {
    /// Stage a workout. Idempotent by `external_id`: a second upsert refreshes
    /// the metadata and returns the same handle.
    pub fn upsert_workout(&mut self, record: WorkoutRecord) -> WorkoutHandle {
        let external_id = record.external_id.clone();
        let index = match self.by_id.get(&external_id) {
            Some(&index) => {
                self.staged[index].record = record;
                index
            }
            None => {
                self.staged.push(StagedWorkout {
                    record,
                    points: Vec::new(),
                });
                let index = self.staged.len() - 1;
                self.by_id.insert(external_id.clone(), index);
                index
            }
        };

        WorkoutHandle { index, external_id }
    }

    /// Append ordered points to a staged workout, continuing its sequence.
    pub fn append_route_points(
        &mut self,
        handle: &WorkoutHandle,
        points: &[TracePoint],
    ) -> Result<usize, StoreError> {
        let staged = self
            .staged
            .get_mut(handle.index)
            .filter(|s| s.record.external_id == handle.external_id)
            .ok_or_else(|| StoreError::UnknownHandle(handle.external_id.clone()))?;

        let offset = staged.points.len() as u32;
        staged.points.extend(
            RoutePoint::from_trace(&handle.external_id, points)
                .into_iter()
                .map(|mut p| {
                    p.sequence += offset;
                    p
                }),
        );

        Ok(points.len())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.staged.iter().map(|s| s.points.len()).sum()
    }

    pub fn into_staged(self) -> Vec<StagedWorkout> {
        self.staged
    }
}

/// What a commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub workouts: usize,
    pub points: usize,
}
