// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for querying routes and driving sync.

use crate::db::RouteStore;
use crate::error::{AppError, Result};
use crate::models::{
    ActivityType, FilterCriteria, ItemFailure, RouteDisplayInfo, RouteSummaryInfo, SyncReport,
    SyncStatus, WorkoutRecord,
};
use crate::services::ActivitySource;
use crate::time_utils::{format_utc_rfc3339, parse_day};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes.
pub fn routes<A: ActivitySource, S: RouteStore>() -> Router<Arc<AppState<A, S>>> {
    Router::new()
        .route("/api/routes", get(get_routes::<A, S>))
        .route("/api/routes/display", get(get_display_info::<A, S>))
        .route("/api/routes/summary", get(get_summary_info::<A, S>))
        .route("/api/sync/status", get(get_sync_status::<A, S>))
        .route("/api/sync", post(trigger_sync::<A, S>))
}

// ─── Filters ─────────────────────────────────────────────────

/// Query parameters shared by the route listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    /// `YYYY-MM-DD`, matched against the workout's UTC start day
    pub date: Option<String>,
    /// Comma-separated activity types, e.g. `running,cycling`
    pub types: Option<String>,
    /// Free-text search, carried through unused
    pub q: Option<String>,
}

impl RouteQuery {
    fn into_filter(self) -> Result<FilterCriteria> {
        let date = self
            .date
            .as_deref()
            .map(|raw| {
                parse_day(raw).map_err(|_| {
                    AppError::BadRequest("Invalid 'date' parameter: must be YYYY-MM-DD".to_string())
                })
            })
            .transpose()?;

        let activity_types = match self.types.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| t.parse::<ActivityType>().map_err(AppError::BadRequest))
                    .collect::<Result<BTreeSet<_>>>()?,
            ),
        };

        Ok(FilterCriteria {
            date,
            activity_types,
            search_text: self.q.filter(|q| !q.trim().is_empty()),
        })
    }
}

// ─── Routes ──────────────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteResponse {
    pub id: String,
    pub activity_type: String,
    pub start_date: String,
    pub end_date: String,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub calories_kcal: Option<f64>,
    pub is_indoor: bool,
}

impl From<WorkoutRecord> for RouteResponse {
    fn from(w: WorkoutRecord) -> Self {
        Self {
            activity_type: w.activity_type.to_string(),
            start_date: format_utc_rfc3339(w.start_date),
            end_date: format_utc_rfc3339(w.end_date),
            id: w.external_id,
            distance_meters: w.distance_meters,
            duration_seconds: w.duration_seconds,
            calories_kcal: w.calories_kcal,
            is_indoor: w.is_indoor,
        }
    }
}

/// List workouts matching the filter, newest first.
async fn get_routes<A: ActivitySource, S: RouteStore>(
    State(state): State<Arc<AppState<A, S>>>,
    Query(params): Query<RouteQuery>,
) -> Result<Json<Vec<RouteResponse>>> {
    let filter = params.into_filter()?;
    tracing::debug!(date = ?filter.date, types = ?filter.activity_types, "Fetching routes");

    let routes = state.query.get_routes(&filter).await?;
    Ok(Json(routes.into_iter().map(RouteResponse::from).collect()))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteDisplayResponse {
    pub id: String,
    pub activity_type: String,
    /// `[latitude, longitude]` pairs
    pub coordinates: Vec<[f64; 2]>,
    pub polyline: String,
}

impl From<RouteDisplayInfo> for RouteDisplayResponse {
    fn from(info: RouteDisplayInfo) -> Self {
        Self {
            id: info.id,
            activity_type: info.activity_type.to_string(),
            coordinates: info.polyline.coordinates,
            polyline: info.polyline.encoded,
        }
    }
}

/// Map-ready routes for workouts with GPS data.
async fn get_display_info<A: ActivitySource, S: RouteStore>(
    State(state): State<Arc<AppState<A, S>>>,
    Query(params): Query<RouteQuery>,
) -> Result<Json<Vec<RouteDisplayResponse>>> {
    let filter = params.into_filter()?;
    let routes = state.query.get_display_info(&filter).await?;
    Ok(Json(
        routes.into_iter().map(RouteDisplayResponse::from).collect(),
    ))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RouteSummaryResponse {
    pub id: String,
    pub activity_type: String,
    pub date: String,
    pub is_indoor: bool,
}

impl From<RouteSummaryInfo> for RouteSummaryResponse {
    fn from(info: RouteSummaryInfo) -> Self {
        Self {
            id: info.id,
            activity_type: info.activity_type.to_string(),
            date: format_utc_rfc3339(info.date),
            is_indoor: info.is_indoor,
        }
    }
}

/// Metadata-only list entries.
async fn get_summary_info<A: ActivitySource, S: RouteStore>(
    State(state): State<Arc<AppState<A, S>>>,
    Query(params): Query<RouteQuery>,
) -> Result<Json<Vec<RouteSummaryResponse>>> {
    let filter = params.into_filter()?;
    let routes = state.query.get_summary_info(&filter).await?;
    Ok(Json(
        routes.into_iter().map(RouteSummaryResponse::from).collect(),
    ))
}

// ─── Sync ────────────────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FailureResponse {
    pub external_id: String,
    pub kind: String,
    pub message: String,
}

impl From<ItemFailure> for FailureResponse {
    fn from(f: ItemFailure) -> Self {
        let kind = match f.kind {
            crate::models::FailureKind::MalformedSample => "malformed_sample",
            crate::models::FailureKind::PartialFetchFailure => "partial_fetch_failure",
        };
        Self {
            external_id: f.external_id,
            kind: kind.to_string(),
            message: f.message,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncReportResponse {
    pub started_at: String,
    pub fetched: u32,
    pub staged: u32,
    pub raw_points: u32,
    pub stored_points: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub elapsed_ms: u64,
    pub failures: Vec<FailureResponse>,
}

impl From<SyncReport> for SyncReportResponse {
    fn from(r: SyncReport) -> Self {
        Self {
            started_at: format_utc_rfc3339(r.started_at),
            fetched: r.fetched as u32,
            staged: r.staged as u32,
            raw_points: r.raw_points as u32,
            stored_points: r.stored_points as u32,
            elapsed_ms: r.elapsed_ms,
            failures: r.failures.into_iter().map(FailureResponse::from).collect(),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncStatusResponse {
    pub syncing: bool,
    pub last_sync_date: Option<String>,
    pub last_report: Option<SyncReportResponse>,
}

impl From<SyncStatus> for SyncStatusResponse {
    fn from(status: SyncStatus) -> Self {
        Self {
            syncing: status.is_syncing(),
            last_sync_date: status.last_sync_date.map(format_utc_rfc3339),
            last_report: status.last_report.map(SyncReportResponse::from),
        }
    }
}

/// Current coordinator state.
async fn get_sync_status<A: ActivitySource, S: RouteStore>(
    State(state): State<Arc<AppState<A, S>>>,
) -> Json<SyncStatusResponse> {
    Json(state.sync.status().into())
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// Overrides the configured minimum interval; `0` forces a sync
    pub min_interval_secs: Option<u64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResponse {
    /// False when the sync was not due or one was already running
    pub synced: bool,
}

/// Run a sync cycle if one is due.
async fn trigger_sync<A: ActivitySource, S: RouteStore>(
    State(state): State<Arc<AppState<A, S>>>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let min_interval = request
        .min_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(state.config.sync_min_interval);

    tracing::info!(min_interval_secs = min_interval.as_secs(), "Sync requested");
    let synced = state.sync.sync_if_due(min_interval).await?;
    Ok(Json(SyncResponse { synced }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parses_types_and_date() {
        let query = RouteQuery {
            date: Some("2024-05-06".to_string()),
            types: Some("running, cycling,".to_string()),
            q: Some("  ".to_string()),
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.date.map(|d| d.to_string()), Some("2024-05-06".to_string()));
        let types = filter.activity_types.unwrap();
        assert!(types.contains(&ActivityType::Running));
        assert!(types.contains(&ActivityType::Cycling));
        assert_eq!(filter.search_text, None);
    }

    #[test]
    fn test_query_rejects_unknown_type() {
        let query = RouteQuery {
            types: Some("swimming".to_string()),
            ..RouteQuery::default()
        };
        assert!(matches!(query.into_filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_empty_types_means_all() {
        let query = RouteQuery {
            types: Some("".to_string()),
            ..RouteQuery::default()
        };
        assert_eq!(query.into_filter().unwrap().activity_types, None);
    }
}
