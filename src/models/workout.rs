// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout, trace and route point models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of workout, as far as route sync cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Walking,
    Running,
    Cycling,
    Hiking,
    Other,
}

impl ActivityType {
    /// Every type the initial historical fetch asks the source for.
    pub const ALL: [ActivityType; 5] = [
        ActivityType::Walking,
        ActivityType::Running,
        ActivityType::Cycling,
        ActivityType::Hiking,
        ActivityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Walking => "walking",
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::Hiking => "hiking",
            ActivityType::Other => "other",
        }
    }

    /// Map a Strava `sport_type` (e.g. "TrailRun", "GravelRide") onto our types.
    ///
    /// Unknown sports fall back to `Other` rather than failing the record.
    pub fn from_sport_type(sport_type: &str) -> Self {
        match sport_type {
            "Walk" => ActivityType::Walking,
            "Run" | "TrailRun" | "VirtualRun" => ActivityType::Running,
            "Ride" | "GravelRide" | "MountainBikeRide" | "EBikeRide" | "EMountainBikeRide"
            | "VirtualRide" => ActivityType::Cycling,
            "Hike" => ActivityType::Hiking,
            _ => ActivityType::Other,
        }
    }

    /// Strava sport types that belong to this activity type.
    ///
    /// `Other` has no fixed list; callers treat it as "everything not listed".
    pub fn sport_types(&self) -> &'static [&'static str] {
        match self {
            ActivityType::Walking => &["Walk"],
            ActivityType::Running => &["Run", "TrailRun", "VirtualRun"],
            ActivityType::Cycling => &[
                "Ride",
                "GravelRide",
                "MountainBikeRide",
                "EBikeRide",
                "EMountainBikeRide",
                "VirtualRide",
            ],
            ActivityType::Hiking => &["Hike"],
            ActivityType::Other => &[],
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" => Ok(ActivityType::Walking),
            "running" => Ok(ActivityType::Running),
            "cycling" => Ok(ActivityType::Cycling),
            "hiking" => Ok(ActivityType::Hiking),
            "other" => Ok(ActivityType::Other),
            other => Err(format!("unknown activity type '{}'", other)),
        }
    }
}

/// Workout metadata as supplied by the activity source.
///
/// `external_id` is the only de-duplication key: a second record with the same
/// id refreshes metadata instead of creating a new workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    /// Source-assigned, stable identifier
    pub external_id: String,
    pub activity_type: ActivityType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub calories_kcal: Option<f64>,
    /// Indoor workouts keep their metadata but never get route points
    pub is_indoor: bool,
}

impl WorkoutRecord {
    /// Check that the record is internally consistent.
    ///
    /// Returns a human-readable reason on failure; callers turn that into a
    /// per-item `MalformedSample` failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.external_id.trim().is_empty() {
            return Err("missing external id".to_string());
        }
        if self.end_date < self.start_date {
            return Err(format!(
                "end date {} precedes start date {}",
                self.end_date, self.start_date
            ));
        }
        for (name, value) in [
            ("distance_meters", self.distance_meters),
            ("duration_seconds", self.duration_seconds),
            ("calories_kcal", self.calories_kcal),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{} is invalid: {}", name, v));
                }
            }
        }
        Ok(())
    }
}

/// A single raw GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl TracePoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Check if the fix has usable coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Persisted projection of a (possibly simplified) trace point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Owning workout's external id
    pub workout_id: String,
    /// Position within the workout's route, 0-based
    pub sequence: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl RoutePoint {
    /// Project an ordered trace onto route points owned by `workout_id`.
    pub fn from_trace(workout_id: &str, points: &[TracePoint]) -> Vec<RoutePoint> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| RoutePoint {
                workout_id: workout_id.to_string(),
                sequence: i as u32,
                latitude: p.latitude,
                longitude: p.longitude,
                timestamp: p.timestamp,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> WorkoutRecord {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        WorkoutRecord {
            external_id: "w-1".to_string(),
            activity_type: ActivityType::Running,
            start_date: start,
            end_date: start + chrono::Duration::minutes(45),
            distance_meters: Some(8_000.0),
            duration_seconds: Some(2_700.0),
            calories_kcal: None,
            is_indoor: false,
        }
    }

    #[test]
    fn test_sport_type_mapping() {
        assert_eq!(ActivityType::from_sport_type("TrailRun"), ActivityType::Running);
        assert_eq!(ActivityType::from_sport_type("GravelRide"), ActivityType::Cycling);
        assert_eq!(ActivityType::from_sport_type("Hike"), ActivityType::Hiking);
        assert_eq!(ActivityType::from_sport_type("Kayaking"), ActivityType::Other);
    }

    #[test]
    fn test_activity_type_parse() {
        assert_eq!("Cycling".parse::<ActivityType>(), Ok(ActivityType::Cycling));
        assert!("swimming".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_validate_rejects_reversed_dates() {
        let mut r = record();
        r.end_date = r.start_date - chrono::Duration::seconds(1);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_distance() {
        let mut r = record();
        r.distance_meters = Some(-1.0);
        assert!(r.validate().unwrap_err().contains("distance_meters"));
        assert!(record().validate().is_ok());
    }

    #[test]
    fn test_trace_point_validity() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        assert!(TracePoint::new(37.4, -122.1, t).is_valid());
        assert!(!TracePoint::new(91.0, 0.0, t).is_valid());
        assert!(!TracePoint::new(f64::NAN, 0.0, t).is_valid());
    }

    #[test]
    fn test_route_points_are_sequenced() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let trace = vec![TracePoint::new(1.0, 2.0, t), TracePoint::new(1.1, 2.1, t)];
        let points = RoutePoint::from_trace("w-1", &trace);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].sequence, 1);
        assert_eq!(points[1].workout_id, "w-1");
    }
}
