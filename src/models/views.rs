// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Display and summary projections returned by the query service.

use crate::models::{ActivityType, RoutePoint};
use chrono::{DateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// Google encoded-polyline precision (5 decimal places, same as Strava).
pub const POLYLINE_PRECISION: u32 = 5;

/// A workout's route ready for map display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    /// `[latitude, longitude]` pairs in timestamp order
    pub coordinates: Vec<[f64; 2]>,
    /// Encoded polyline string
    pub encoded: String,
}

impl Polyline {
    /// Build a polyline from timestamp-ordered route points.
    pub fn from_route_points(points: &[RoutePoint]) -> Result<Self, String> {
        let coords = points.iter().map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        });
        let encoded = polyline::encode_coordinates(coords, POLYLINE_PRECISION)
            .map_err(|e| e.to_string())?;

        Ok(Self {
            coordinates: points.iter().map(|p| [p.latitude, p.longitude]).collect(),
            encoded,
        })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Map-layer projection of a stored workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDisplayInfo {
    pub id: String,
    pub activity_type: ActivityType,
    pub polyline: Polyline,
}

/// List-view projection of a stored workout (metadata only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummaryInfo {
    pub id: String,
    pub activity_type: ActivityType,
    pub date: DateTime<Utc>,
    pub is_indoor: bool,
}
