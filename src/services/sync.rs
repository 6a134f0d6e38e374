// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync coordinator.
//!
//! One cycle: fetch workouts from the source, fetch and simplify each trace
//! on a bounded worker pool, stage everything into a single write context,
//! commit once, then advance the watermark to the cycle start time.
//!
//! Incremental cycles ask for workouts starting a lookback window before the
//! watermark, so a workout saved to the source after it started is still
//! picked up. Re-fetched workouts replace their stored rows.
//!
//! Only one cycle runs at a time. State for presentation layers is published
//! through a `watch` channel.

use crate::db::{RouteStore, WatermarkStore, WriteContext};
use crate::error::{StoreError, SyncError};
use crate::models::{
    ActivityType, ItemFailure, SyncPhase, SyncReport, SyncStatus, TracePoint, WorkoutRecord,
};
use crate::services::ingestion::{IngestBatch, IngestionService, PendingWorkout};
use crate::services::simplifier::{path_length_meters, simplify_by_distance};
use crate::services::source::ActivitySource;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Default distance tolerance for stored routes.
pub const DEFAULT_TOLERANCE_METERS: f64 = 10.0;

/// Default upper bound on a cycle's fetch phase.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(600);

/// Default reach of an incremental cycle before the watermark.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(24 * 3600);

/// Worker pool ceiling.
const MAX_DEFAULT_CONCURRENCY: usize = 8;

/// Available cores, capped.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_CONCURRENCY)
}

/// Tunables for a coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Trace fetches in flight at once
    pub concurrency: usize,
    /// `simplify_by_distance` tolerance
    pub tolerance_meters: f64,
    /// Limit on the fetch/stage phase of one cycle
    pub deadline: Duration,
    /// Incremental cycles fetch from `watermark - lookback`
    pub lookback: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            tolerance_meters: DEFAULT_TOLERANCE_METERS,
            deadline: DEFAULT_DEADLINE,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

/// What a cycle asks the source for.
#[derive(Debug, Clone, Copy)]
enum FetchScope {
    /// Everything, across all supported activity types
    Initial,
    /// Workouts starting at or after the given time
    Since(DateTime<Utc>),
}

/// Output of one worker.
struct ProcessedWorkout {
    record: WorkoutRecord,
    raw_points: usize,
    points: Vec<TracePoint>,
}

/// Staged writes plus the report so far.
struct StagedCycle {
    ctx: WriteContext,
    report: SyncReport,
}

/// Single-flight guard. Dropping it returns the coordinator to `Idle`, even
/// when the cycle future is cancelled.
struct CycleGuard<'a> {
    in_flight: &'a AtomicBool,
    status: &'a watch::Sender<SyncStatus>,
}

impl<'a> CycleGuard<'a> {
    fn acquire(in_flight: &'a AtomicBool, status: &'a watch::Sender<SyncStatus>) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { in_flight, status })
    }

    fn mark_syncing(&self) {
        self.status.send_modify(|s| s.phase = SyncPhase::Syncing);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|s| {
            let changed = s.phase != SyncPhase::Idle;
            s.phase = SyncPhase::Idle;
            changed
        });
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Start of an incremental window: `lookback` before the watermark, or the
/// epoch when there is none.
pub fn incremental_since(last_sync: Option<DateTime<Utc>>, lookback: Duration) -> DateTime<Utc> {
    last_sync
        .zip(chrono::Duration::from_std(lookback).ok())
        .and_then(|(last, lookback)| last.checked_sub_signed(lookback))
        .unwrap_or_default()
}

/// Whether a cycle is due at `now` given the last successful sync.
pub fn is_due(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>, min_interval: Duration) -> bool {
    match last_sync {
        None => true,
        Some(last) => (now - last)
            .to_std()
            .map_or(false, |elapsed| elapsed > min_interval),
    }
}

/// Orchestrates throttled fetch, simplify and persist cycles.
pub struct SyncCoordinator<A, S> {
    ingestion: Arc<IngestionService<A>>,
    store: Arc<S>,
    watermark: Arc<dyn WatermarkStore>,
    settings: SyncSettings,
    in_flight: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl<A: ActivitySource, S: RouteStore> SyncCoordinator<A, S> {
    /// Create a coordinator, seeding its status from the stored watermark.
    pub fn new(
        source: Arc<A>,
        store: Arc<S>,
        watermark: Arc<dyn WatermarkStore>,
        settings: SyncSettings,
    ) -> Result<Self, SyncError> {
        let last_sync_date = watermark.load()?;
        let (status, _) = watch::channel(SyncStatus {
            last_sync_date,
            ..SyncStatus::default()
        });

        Ok(Self {
            ingestion: Arc::new(IngestionService::new(source)),
            store,
            watermark,
            settings,
            in_flight: AtomicBool::new(false),
            status,
        })
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Receiver that sees every published status change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn last_sync_date(&self) -> Option<DateTime<Utc>> {
        self.status.borrow().last_sync_date
    }

    /// Run an incremental cycle if more than `min_interval` has passed since
    /// the last successful sync.
    ///
    /// Returns `Ok(false)` without side effects when the cycle is not due or
    /// another cycle is already running.
    pub async fn sync_if_due(&self, min_interval: Duration) -> Result<bool, SyncError> {
        let Some(guard) = CycleGuard::acquire(&self.in_flight, &self.status) else {
            tracing::debug!("Sync already in progress, skipping");
            return Ok(false);
        };

        let now = Utc::now();
        let last_sync = self.load_watermark().await?;
        if !is_due(last_sync, now, min_interval) {
            tracing::debug!(last_sync = ?last_sync, "Sync not due");
            return Ok(false);
        }

        guard.mark_syncing();
        let since = incremental_since(last_sync, self.settings.lookback);
        self.run_cycle(now, FetchScope::Since(since)).await?;
        Ok(true)
    }

    /// Load the full history once, when the store is empty.
    ///
    /// With data already present this returns `Ok(true)` without contacting
    /// the source. `Ok(false)` means another cycle was running.
    pub async fn ensure_initial_data(&self) -> Result<bool, SyncError> {
        let Some(guard) = CycleGuard::acquire(&self.in_flight, &self.status) else {
            tracing::debug!("Sync already in progress, skipping initial load");
            return Ok(false);
        };

        let existing = self.store.workout_count().await?;
        if existing > 0 {
            tracing::debug!(existing, "Initial data already present");
            return Ok(true);
        }

        guard.mark_syncing();
        tracing::info!("Store empty, running historical import");
        self.run_cycle(Utc::now(), FetchScope::Initial).await?;
        Ok(true)
    }

    async fn run_cycle(
        &self,
        started_at: DateTime<Utc>,
        scope: FetchScope,
    ) -> Result<SyncReport, SyncError> {
        let timer = Instant::now();
        let deadline = self.settings.deadline;

        let staged = tokio::time::timeout(deadline, self.fetch_and_stage(started_at, scope))
            .await
            .map_err(|_| {
                tracing::warn!(deadline_secs = deadline.as_secs(), "Sync cycle deadline exceeded");
                SyncError::DeadlineExceeded(deadline)
            })??;

        let StagedCycle { ctx, mut report } = staged;
        let summary = self.store.commit(ctx).await.map_err(|e| {
            tracing::error!(error = %e, "Sync commit failed, watermark unchanged");
            SyncError::Store(e)
        })?;

        let previous = self.load_watermark().await?;
        let watermark = previous.map_or(started_at, |prev| prev.max(started_at));
        self.save_watermark(watermark).await?;

        report.staged = summary.workouts;
        report.stored_points = summary.points;
        report.elapsed_ms = timer.elapsed().as_millis() as u64;

        tracing::info!(
            fetched = report.fetched,
            staged = report.staged,
            failures = report.failures.len(),
            raw_points = report.raw_points,
            stored_points = report.stored_points,
            elapsed_ms = report.elapsed_ms,
            "Sync cycle committed"
        );

        self.status.send_modify(|s| {
            s.phase = SyncPhase::Idle;
            s.last_sync_date = Some(watermark);
            s.last_report = Some(report.clone());
        });
        Ok(report)
    }

    /// Watermark stores do blocking I/O, so run them off the async workers.
    async fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let watermark = Arc::clone(&self.watermark);
        tokio::task::spawn_blocking(move || watermark.load())
            .await
            .map_err(|e| StoreError::Io(format!("watermark load task failed: {}", e)))?
    }

    async fn save_watermark(&self, value: DateTime<Utc>) -> Result<(), StoreError> {
        let watermark = Arc::clone(&self.watermark);
        tokio::task::spawn_blocking(move || watermark.save(value))
            .await
            .map_err(|e| StoreError::Io(format!("watermark save task failed: {}", e)))?
    }

    async fn fetch_and_stage(
        &self,
        started_at: DateTime<Utc>,
        scope: FetchScope,
    ) -> Result<StagedCycle, SyncError> {
        let IngestBatch { workouts, failures } = match scope {
            FetchScope::Initial => {
                self.ingestion
                    .fetch_initial(&ActivityType::ALL, started_at)
                    .await?
            }
            FetchScope::Since(since) => self.ingestion.fetch_since(since).await?,
        };

        let mut report = SyncReport {
            started_at,
            fetched: workouts.len(),
            failures,
            ..SyncReport::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        // Lets a panicked task still be reported against its workout.
        let mut task_ids = HashMap::with_capacity(workouts.len());
        for workout in workouts {
            let ingestion = Arc::clone(&self.ingestion);
            let semaphore = Arc::clone(&semaphore);
            let tolerance = self.settings.tolerance_meters;
            let external_id = workout.external_id().to_string();
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                process_workout(&ingestion, workout, tolerance).await
            });
            task_ids.insert(handle.id(), external_id);
        }

        // This loop is the only writer to the context.
        let mut ctx = self.store.begin();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(processed))) => {
                    let handle = ctx.upsert_workout(processed.record);
                    if !processed.points.is_empty() {
                        ctx.append_route_points(&handle, &processed.points)?;
                    }
                    report.raw_points += processed.raw_points;
                }
                Ok((_, Err(failure))) => {
                    tracing::warn!(
                        workout_id = %failure.external_id,
                        kind = ?failure.kind,
                        message = %failure.message,
                        "Workout skipped this cycle"
                    );
                    report.failures.push(failure);
                }
                Err(e) => {
                    let external_id = task_ids.remove(&e.id()).unwrap_or_default();
                    tracing::error!(workout_id = %external_id, error = %e, "Workout task failed");
                    report.failures.push(ItemFailure::partial_fetch(
                        &external_id,
                        format!("worker task failed: {}", e),
                    ));
                }
            }
        }

        Ok(StagedCycle { ctx, report })
    }
}

/// Fetch and simplify one workout's route.
async fn process_workout<A: ActivitySource>(
    ingestion: &IngestionService<A>,
    workout: PendingWorkout,
    tolerance_meters: f64,
) -> Result<ProcessedWorkout, ItemFailure> {
    let raw = ingestion.fetch_trace(&workout).await?;
    let points = simplify_by_distance(&raw, tolerance_meters);

    tracing::debug!(
        workout_id = %workout.external_id(),
        raw_points = raw.len(),
        kept = points.len(),
        length_m = path_length_meters(&points).round(),
        "Simplified route"
    );

    Ok(ProcessedWorkout {
        record: workout.record,
        raw_points: raw.len(),
        points,
    })
}
