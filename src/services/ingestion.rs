// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalizes activity source output into canonical records.
//!
//! Batch-level problems (source disabled, access denied) fail the call.
//! Problems with a single workout become an [`ItemFailure`] and the rest of
//! the batch carries on.

use crate::error::SourceError;
use crate::models::{ActivityType, DateRange, ItemFailure, TracePoint, WorkoutRecord};
use crate::services::source::{ActivitySource, TraceChunk};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Trace stream attempts before giving up on a workout.
const MAX_TRACE_ATTEMPTS: usize = 2;

/// A validated workout waiting for its trace.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWorkout {
    pub record: WorkoutRecord,
    /// Indoor workouts keep their metadata but skip route processing
    pub wants_route: bool,
}

impl PendingWorkout {
    pub fn external_id(&self) -> &str {
        &self.record.external_id
    }
}

/// Result of one metadata fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestBatch {
    pub workouts: Vec<PendingWorkout>,
    pub failures: Vec<ItemFailure>,
}

/// Outcome of reading one trace stream.
enum TraceRead {
    Complete(Vec<Vec<TracePoint>>),
    Truncated,
}

pub struct IngestionService<A> {
    source: Arc<A>,
}

impl<A: ActivitySource> IngestionService<A> {
    pub fn new(source: Arc<A>) -> Self {
        Self { source }
    }

    /// Full historical fetch across the requested types.
    pub async fn fetch_initial(
        &self,
        activity_types: &[ActivityType],
        now: DateTime<Utc>,
    ) -> Result<IngestBatch, SourceError> {
        let range = DateRange::all_time(now);
        // One query for all types; a remote source pages its history once.
        let mut records = self.source.query_workouts(activity_types, range).await?;
        records.sort_by_key(|w| w.start_date);

        let batch = normalize(records);
        tracing::info!(
            types = activity_types.len(),
            workouts = batch.workouts.len(),
            malformed = batch.failures.len(),
            "Fetched historical workouts"
        );
        Ok(batch)
    }

    /// Workouts that started at or after `watermark`.
    pub async fn fetch_since(&self, watermark: DateTime<Utc>) -> Result<IngestBatch, SourceError> {
        let records = self.source.query_workouts_since(watermark).await?;
        let batch = normalize(records);
        tracing::info!(
            since = %watermark,
            workouts = batch.workouts.len(),
            malformed = batch.failures.len(),
            "Fetched new workouts"
        );
        Ok(batch)
    }

    /// Fetch, clean and order one workout's raw trace.
    ///
    /// Segments are concatenated, fixes with unusable coordinates are
    /// dropped, and the result is stable-sorted by timestamp. A stream that
    /// closes before its done signal is re-requested once.
    pub async fn fetch_trace(&self, workout: &PendingWorkout) -> Result<Vec<TracePoint>, ItemFailure> {
        if !workout.wants_route {
            return Ok(Vec::new());
        }

        let id = workout.external_id();
        for attempt in 1..=MAX_TRACE_ATTEMPTS {
            match self.read_trace(id).await {
                Ok(TraceRead::Complete(segments)) => return Ok(assemble(id, segments)),
                Ok(TraceRead::Truncated) => {
                    tracing::warn!(workout_id = %id, attempt, "Trace stream ended early");
                }
                Err(SourceError::MalformedSample { reason, .. }) => {
                    return Err(ItemFailure::malformed(id, reason));
                }
                Err(e) => return Err(ItemFailure::partial_fetch(id, e.to_string())),
            }
        }

        Err(ItemFailure::partial_fetch(
            id,
            format!("trace stream incomplete after {} attempts", MAX_TRACE_ATTEMPTS),
        ))
    }

    async fn read_trace(&self, id: &str) -> Result<TraceRead, SourceError> {
        let mut stream = self.source.query_trace(id).await?;
        let mut segments = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                TraceChunk::Segment(points) => segments.push(points),
                TraceChunk::Done => return Ok(TraceRead::Complete(segments)),
            }
        }
        Ok(TraceRead::Truncated)
    }
}

/// De-duplicate by external id (last one wins) and validate.
fn normalize(records: Vec<WorkoutRecord>) -> IngestBatch {
    let mut unique: Vec<WorkoutRecord> = Vec::with_capacity(records.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for record in records {
        match seen.get(&record.external_id) {
            Some(&i) => unique[i] = record,
            None => {
                seen.insert(record.external_id.clone(), unique.len());
                unique.push(record);
            }
        }
    }

    let mut batch = IngestBatch::default();
    for record in unique {
        match record.validate() {
            Ok(()) => batch.workouts.push(PendingWorkout {
                wants_route: !record.is_indoor,
                record,
            }),
            Err(reason) => {
                tracing::warn!(workout_id = %record.external_id, %reason, "Skipping malformed workout");
                batch
                    .failures
                    .push(ItemFailure::malformed(&record.external_id, reason));
            }
        }
    }
    batch
}

fn assemble(id: &str, segments: Vec<Vec<TracePoint>>) -> Vec<TracePoint> {
    let mut points: Vec<TracePoint> = segments.into_iter().flatten().collect();

    let before = points.len();
    points.retain(TracePoint::is_valid);
    let dropped = before - points.len();
    if dropped > 0 {
        tracing::warn!(workout_id = %id, dropped, "Dropped invalid GPS fixes");
    }

    points.sort_by_key(|p| p.timestamp);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(id: &str, distance: f64) -> WorkoutRecord {
        let start = Utc.with_ymd_and_hms(2024, 8, 1, 6, 0, 0).unwrap();
        WorkoutRecord {
            external_id: id.to_string(),
            activity_type: ActivityType::Running,
            start_date: start,
            end_date: start + Duration::minutes(20),
            distance_meters: Some(distance),
            duration_seconds: None,
            calories_kcal: None,
            is_indoor: false,
        }
    }

    #[test]
    fn test_normalize_last_duplicate_wins() {
        let batch = normalize(vec![record("a", 1.0), record("b", 2.0), record("a", 3.0)]);
        assert_eq!(batch.workouts.len(), 2);
        assert_eq!(batch.workouts[0].record.external_id, "a");
        assert_eq!(batch.workouts[0].record.distance_meters, Some(3.0));
    }

    #[test]
    fn test_normalize_isolates_invalid_record() {
        let batch = normalize(vec![record("good", 1.0), record("bad", -5.0)]);
        assert_eq!(batch.workouts.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].external_id, "bad");
    }

    #[test]
    fn test_assemble_sorts_and_filters() {
        let t = Utc.with_ymd_and_hms(2024, 8, 1, 6, 0, 0).unwrap();
        let later = vec![TracePoint::new(1.0, 1.0, t + Duration::seconds(10))];
        let earlier = vec![
            TracePoint::new(0.0, 0.0, t),
            TracePoint::new(200.0, 0.0, t + Duration::seconds(5)),
        ];

        let points = assemble("w", vec![later, earlier]);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, t);
        assert_eq!(points[1].timestamp, t + Duration::seconds(10));
    }
}
