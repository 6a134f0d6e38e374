// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity source abstraction and an in-memory implementation.

use crate::error::SourceError;
use crate::models::{ActivityType, DateRange, TracePoint, WorkoutRecord};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// One message on a trace stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceChunk {
    /// A run of fixes. Segments may arrive in any order.
    Segment(Vec<TracePoint>),
    /// No more chunks follow.
    Done,
}

/// Finite stream of trace chunks for one workout.
///
/// A stream that closes without [`TraceChunk::Done`] was cut short; asking
/// the source for the trace again starts a fresh stream.
pub struct TraceStream {
    rx: mpsc::Receiver<Result<TraceChunk, SourceError>>,
}

impl TraceStream {
    /// Create a stream plus the sender that feeds it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<TraceChunk, SourceError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// A stream that yields `chunks` and then closes.
    pub fn from_chunks(chunks: Vec<TraceChunk>) -> Self {
        let (tx, stream) = Self::channel(chunks.len());
        for chunk in chunks {
            // Capacity equals the chunk count, so this never fills up.
            let _ = tx.try_send(Ok(chunk));
        }
        stream
    }

    pub async fn next(&mut self) -> Option<Result<TraceChunk, SourceError>> {
        self.rx.recv().await
    }
}

/// External supplier of workout metadata and raw GPS fixes.
pub trait ActivitySource: Send + Sync + 'static {
    /// Ask the user for read access. `Ok(false)` means access was refused.
    fn request_authorization(&self) -> impl Future<Output = Result<bool, SourceError>> + Send;

    /// Workouts of the given types that started inside `range`.
    fn query_workouts(
        &self,
        activity_types: &[ActivityType],
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<WorkoutRecord>, SourceError>> + Send;

    /// Workouts that started at or after `since`.
    fn query_workouts_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<WorkoutRecord>, SourceError>> + Send;

    /// Open the trace stream for one workout.
    fn query_trace(
        &self,
        workout_id: &str,
    ) -> impl Future<Output = Result<TraceStream, SourceError>> + Send;
}

/// Scripted activity source.
///
/// Holds workouts and their trace segments in memory and can be told to
/// misbehave: go unavailable, refuse authorization, fail or truncate a given
/// trace, or slow every trace fetch down. Counts the calls it receives.
#[derive(Default)]
pub struct InMemorySource {
    workouts: DashMap<String, WorkoutRecord>,
    traces: DashMap<String, Vec<Vec<TracePoint>>>,
    unavailable: AtomicBool,
    denied: AtomicBool,
    failing_traces: DashSet<String>,
    truncate_once: DashSet<String>,
    trace_delay_ms: AtomicU64,
    workout_queries: AtomicUsize,
    trace_queries: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a workout with its trace split into `segments`.
    pub fn add_workout(&self, record: WorkoutRecord, segments: Vec<Vec<TracePoint>>) {
        self.traces.insert(record.external_id.clone(), segments);
        self.workouts.insert(record.external_id.clone(), record);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    /// Every trace fetch for `workout_id` fails until cleared.
    pub fn fail_trace(&self, workout_id: &str) {
        self.failing_traces.insert(workout_id.to_string());
    }

    pub fn clear_trace_failure(&self, workout_id: &str) {
        self.failing_traces.remove(workout_id);
    }

    /// The next stream for `workout_id` closes without `Done`.
    pub fn truncate_trace_once(&self, workout_id: &str) {
        self.truncate_once.insert(workout_id.to_string());
    }

    /// Delay applied to every trace fetch.
    pub fn set_trace_delay(&self, delay: Duration) {
        self.trace_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of workout queries received.
    pub fn workout_queries(&self) -> usize {
        self.workout_queries.load(Ordering::SeqCst)
    }

    /// Number of trace queries received.
    pub fn trace_queries(&self) -> usize {
        self.trace_queries.load(Ordering::SeqCst)
    }

    /// Total source calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.workout_queries() + self.trace_queries()
    }

    fn check_access(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("source disabled".to_string()));
        }
        if self.denied.load(Ordering::SeqCst) {
            return Err(SourceError::NotAuthorized);
        }
        Ok(())
    }

    fn select(&self, keep: impl Fn(&WorkoutRecord) -> bool) -> Vec<WorkoutRecord> {
        let mut found: Vec<WorkoutRecord> = self
            .workouts
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|w| w.start_date);
        found
    }
}

impl ActivitySource for InMemorySource {
    async fn request_authorization(&self) -> Result<bool, SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("source disabled".to_string()));
        }
        Ok(!self.denied.load(Ordering::SeqCst))
    }

    async fn query_workouts(
        &self,
        activity_types: &[ActivityType],
        range: DateRange,
    ) -> Result<Vec<WorkoutRecord>, SourceError> {
        self.workout_queries.fetch_add(1, Ordering::SeqCst);
        self.check_access()?;
        Ok(self.select(|w| {
            activity_types.contains(&w.activity_type) && range.contains(w.start_date)
        }))
    }

    async fn query_workouts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkoutRecord>, SourceError> {
        self.workout_queries.fetch_add(1, Ordering::SeqCst);
        self.check_access()?;
        Ok(self.select(|w| w.start_date >= since))
    }

    async fn query_trace(&self, workout_id: &str) -> Result<TraceStream, SourceError> {
        self.trace_queries.fetch_add(1, Ordering::SeqCst);
        let delay = self.trace_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_access()?;

        if self.failing_traces.contains(workout_id) {
            return Err(SourceError::TraceFetch {
                id: workout_id.to_string(),
                message: "injected trace failure".to_string(),
            });
        }

        let mut chunks: Vec<TraceChunk> = self
            .traces
            .get(workout_id)
            .map(|segments| segments.iter().cloned().map(TraceChunk::Segment).collect())
            .unwrap_or_default();

        if self.truncate_once.remove(workout_id).is_none() {
            chunks.push(TraceChunk::Done);
        }

        Ok(TraceStream::from_chunks(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_from_chunks_drains_then_closes() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut stream = TraceStream::from_chunks(vec![
            TraceChunk::Segment(vec![TracePoint::new(1.0, 2.0, t)]),
            TraceChunk::Done,
        ]);

        assert!(matches!(stream.next().await, Some(Ok(TraceChunk::Segment(_)))));
        assert_eq!(stream.next().await, Some(Ok(TraceChunk::Done)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_truncation_applies_once() {
        let source = InMemorySource::new();
        source.truncate_trace_once("w-1");

        let mut first = source.query_trace("w-1").await.unwrap();
        assert_eq!(first.next().await, None);

        let mut second = source.query_trace("w-1").await.unwrap();
        assert_eq!(second.next().await, Some(Ok(TraceChunk::Done)));
        assert_eq!(source.trace_queries(), 2);
    }

    #[tokio::test]
    async fn test_denied_source() {
        let source = InMemorySource::new();
        source.set_denied(true);
        assert_eq!(source.request_authorization().await, Ok(false));
        assert_eq!(
            source.query_workouts_since(Utc::now()).await,
            Err(SourceError::NotAuthorized)
        );
    }
}
