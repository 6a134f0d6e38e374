// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite-backed route store.
//!
//! Timestamps are stored as Unix milliseconds so ordering and range filters
//! happen in SQL. All blocking calls run on the tokio blocking pool.

use super::{tables, CommitSummary, RouteStore, WriteContext};
use crate::error::StoreError;
use crate::models::{ActivityType, RoutePoint, WorkoutPredicate, WorkoutRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Error::FromSqlConversionFailure;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workouts (
    external_id      TEXT PRIMARY KEY,
    activity_type    TEXT NOT NULL,
    start_ms         INTEGER NOT NULL,
    end_ms           INTEGER NOT NULL,
    distance_meters  REAL,
    duration_seconds REAL,
    calories_kcal    REAL,
    is_indoor        INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_workouts_start ON workouts(start_ms);

CREATE TABLE IF NOT EXISTS route_points (
    workout_id   TEXT NOT NULL REFERENCES workouts(external_id),
    sequence     INTEGER NOT NULL,
    latitude     REAL NOT NULL,
    longitude    REAL NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    PRIMARY KEY (workout_id, sequence)
);
";

/// Route store persisted in a SQLite database file.
#[derive(Clone)]
pub struct SqliteRouteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRouteStore {
    /// Open or create a database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(sql_err)?;
        Self::initialize(conn)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(sql_err)?;
        tracing::debug!("Route store schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Io("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Io(format!("blocking task failed: {}", e)))?
    }
}

impl RouteStore for SqliteRouteStore {
    async fn fetch_all(
        &self,
        predicate: Option<&WorkoutPredicate>,
    ) -> Result<Vec<WorkoutRecord>, StoreError> {
        let (sql, values) = select_workouts(predicate);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), workout_from_row)
                .map_err(sql_err)?;

            let mut workouts = Vec::new();
            for row in rows {
                workouts.push(row.map_err(sql_err)?);
            }
            Ok(workouts)
        })
        .await
    }

    async fn route_points(&self, workout_id: &str) -> Result<Vec<RoutePoint>, StoreError> {
        let workout_id = workout_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT sequence, latitude, longitude, timestamp_ms FROM {} \
                     WHERE workout_id = ?1 ORDER BY timestamp_ms ASC, sequence ASC",
                    tables::ROUTE_POINTS
                ))
                .map_err(sql_err)?;

            let rows = stmt
                .query_map(params![workout_id], |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(sql_err)?;

            let mut points = Vec::new();
            for row in rows {
                let (sequence, latitude, longitude, ts) = row.map_err(sql_err)?;
                points.push(RoutePoint {
                    workout_id: workout_id.clone(),
                    sequence,
                    latitude,
                    longitude,
                    timestamp: from_millis(ts)?,
                });
            }
            Ok(points)
        })
        .await
    }

    async fn workout_count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {}", tables::WORKOUTS),
                    [],
                    |row| row.get(0),
                )
                .map_err(sql_err)?;
            Ok(count as usize)
        })
        .await
    }

    async fn commit(&self, ctx: WriteContext) -> Result<CommitSummary, StoreError> {
        let staged = ctx.into_staged();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(sql_err)?;
            let mut summary = CommitSummary::default();
            {
                let mut upsert = tx
                    .prepare(&format!(
                        "INSERT INTO {} (external_id, activity_type, start_ms, end_ms, \
                         distance_meters, duration_seconds, calories_kcal, is_indoor) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                         ON CONFLICT(external_id) DO UPDATE SET \
                         activity_type = excluded.activity_type, \
                         start_ms = excluded.start_ms, \
                         end_ms = excluded.end_ms, \
                         distance_meters = excluded.distance_meters, \
                         duration_seconds = excluded.duration_seconds, \
                         calories_kcal = excluded.calories_kcal, \
                         is_indoor = excluded.is_indoor",
                        tables::WORKOUTS
                    ))
                    .map_err(sql_err)?;
                let mut clear_points = tx
                    .prepare(&format!(
                        "DELETE FROM {} WHERE workout_id = ?1",
                        tables::ROUTE_POINTS
                    ))
                    .map_err(sql_err)?;
                let mut insert_point = tx
                    .prepare(&format!(
                        "INSERT INTO {} (workout_id, sequence, latitude, longitude, timestamp_ms) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        tables::ROUTE_POINTS
                    ))
                    .map_err(sql_err)?;

                for item in &staged {
                    let w = &item.record;
                    upsert
                        .execute(params![
                            w.external_id,
                            w.activity_type.as_str(),
                            w.start_date.timestamp_millis(),
                            w.end_date.timestamp_millis(),
                            w.distance_meters,
                            w.duration_seconds,
                            w.calories_kcal,
                            w.is_indoor,
                        ])
                        .map_err(sql_err)?;
                    summary.workouts += 1;

                    if item.points.is_empty() {
                        continue;
                    }
                    clear_points
                        .execute(params![w.external_id])
                        .map_err(sql_err)?;
                    for p in &item.points {
                        insert_point
                            .execute(params![
                                p.workout_id,
                                p.sequence,
                                p.latitude,
                                p.longitude,
                                p.timestamp.timestamp_millis(),
                            ])
                            .map_err(sql_err)?;
                    }
                    summary.points += item.points.len();
                }
            }
            tx.commit().map_err(sql_err)?;
            Ok(summary)
        })
        .await
    }
}

/// Build the workout SELECT for `predicate` with its bound values.
fn select_workouts(predicate: Option<&WorkoutPredicate>) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(range) = predicate.and_then(|p| p.start_range) {
        clauses.push(format!(
            "start_ms >= ?{} AND start_ms < ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Value::Integer(range.start.timestamp_millis()));
        values.push(Value::Integer(range.end.timestamp_millis()));
    }

    if let Some(types) = predicate.and_then(|p| p.activity_types.as_ref()) {
        if types.is_empty() {
            clauses.push("0".to_string());
        } else {
            let placeholders: Vec<String> = types
                .iter()
                .map(|t| {
                    values.push(Value::Text(t.as_str().to_string()));
                    format!("?{}", values.len())
                })
                .collect();
            clauses.push(format!("activity_type IN ({})", placeholders.join(", ")));
        }
    }

    let mut sql = format!(
        "SELECT external_id, activity_type, start_ms, end_ms, distance_meters, \
         duration_seconds, calories_kcal, is_indoor FROM {}",
        tables::WORKOUTS
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY start_ms DESC, external_id ASC");

    (sql, values)
}

fn workout_from_row(row: &Row<'_>) -> rusqlite::Result<WorkoutRecord> {
    let activity_type: String = row.get(1)?;
    let activity_type = activity_type
        .parse::<ActivityType>()
        .map_err(|e| FromSqlConversionFailure(1, Type::Text, e.into()))?;

    Ok(WorkoutRecord {
        external_id: row.get(0)?,
        activity_type,
        start_date: millis_column(row, 2)?,
        end_date: millis_column(row, 3)?,
        distance_meters: row.get(4)?,
        duration_seconds: row.get(5)?,
        calories_kcal: row.get(6)?,
        is_indoor: row.get(7)?,
    })
}

fn millis_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    from_millis(ms).map_err(|e| FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Io(format!("timestamp out of range: {}", ms)))
}

fn sql_err(e: rusqlite::Error) -> StoreError {
    StoreError::Io(e.to_string())
}
