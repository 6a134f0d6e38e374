// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read side: filtered workouts and their display projections.

use crate::db::RouteStore;
use crate::error::StoreError;
use crate::models::{
    FilterCriteria, Polyline, RouteDisplayInfo, RoutePoint, RouteSummaryInfo, WorkoutRecord,
};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Route point loads in flight while building display info.
const POINT_LOAD_CONCURRENCY: usize = 8;

/// Queries stored routes. Polylines are rebuilt on every call.
pub struct RouteQueryService<S> {
    store: Arc<S>,
}

impl<S: RouteStore> RouteQueryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Workouts matching `filter`, newest first.
    pub async fn get_routes(&self, filter: &FilterCriteria) -> Result<Vec<WorkoutRecord>, StoreError> {
        let predicate = filter.predicate();
        self.store.fetch_all(Some(&predicate)).await
    }

    /// Map-ready routes for workouts matching `filter`.
    ///
    /// Workouts without route points (indoor, or no GPS data) are left out.
    pub async fn get_display_info(
        &self,
        filter: &FilterCriteria,
    ) -> Result<Vec<RouteDisplayInfo>, StoreError> {
        let workouts = self.get_routes(filter).await?;

        let loaded: Vec<(WorkoutRecord, Vec<RoutePoint>)> = stream::iter(workouts)
            .map(|workout| {
                let store = Arc::clone(&self.store);
                async move {
                    let points = store.route_points(&workout.external_id).await?;
                    Ok::<_, StoreError>((workout, points))
                }
            })
            .buffered(POINT_LOAD_CONCURRENCY)
            .try_collect()
            .await?;

        let mut routes = Vec::with_capacity(loaded.len());
        for (workout, points) in loaded {
            if points.is_empty() {
                continue;
            }
            match Polyline::from_route_points(&points) {
                Ok(polyline) => routes.push(RouteDisplayInfo {
                    id: workout.external_id,
                    activity_type: workout.activity_type,
                    polyline,
                }),
                Err(e) => {
                    tracing::warn!(workout_id = %workout.external_id, error = %e, "Could not encode route");
                }
            }
        }

        Ok(routes)
    }

    /// Metadata-only list entries for workouts matching `filter`, newest first.
    pub async fn get_summary_info(
        &self,
        filter: &FilterCriteria,
    ) -> Result<Vec<RouteSummaryInfo>, StoreError> {
        Ok(self
            .get_routes(filter)
            .await?
            .into_iter()
            .map(|w| RouteSummaryInfo {
                id: w.external_id,
                activity_type: w.activity_type,
                date: w.start_date,
                is_indoor: w.is_indoor,
            })
            .collect())
    }
}
