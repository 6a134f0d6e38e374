// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API activity source.
//!
//! Handles:
//! - Paged activity listing with `after`/`before` bounds
//! - Trace fetching via the activity streams endpoint
//! - Authorization probing against the athlete endpoint
//! - Rate limit and token errors mapped onto `SourceError`

use crate::error::SourceError;
use crate::models::{ActivityType, DateRange, TracePoint, WorkoutRecord};
use crate::services::source::{ActivitySource, TraceChunk, TraceStream};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;

/// Default Strava API base URL.
pub const STRAVA_API_URL: &str = "https://www.strava.com/api/v3";

/// Strava's maximum page size for activity listing.
const PAGE_SIZE: u32 = 200;

/// Upper bound on pages fetched by one query.
const MAX_PAGES: u32 = 100;

/// Strava client acting as an [`ActivitySource`].
#[derive(Clone)]
pub struct StravaSource {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    /// Activity start times seen in listings, keyed by activity id
    start_cache: Arc<DashMap<String, DateTime<Utc>>>,
}

impl StravaSource {
    /// Create a source for the athlete owning `access_token`.
    pub fn new(access_token: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            start_cache: Arc::new(DashMap::new()),
        }
    }

    /// List activities between two Unix timestamps, all pages.
    async fn list_activities(
        &self,
        after: i64,
        before: Option<i64>,
    ) -> Result<Vec<StravaActivitySummary>, SourceError> {
        let url = format!("{}/athlete/activities", self.base_url);
        let mut all = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut query = vec![
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ];
            if let Some(before) = before {
                query.push(("before", before.to_string()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| SourceError::Unavailable(e.to_string()))?;

            let batch: Vec<StravaActivitySummary> = check_response_json(response).await?;
            for activity in &batch {
                self.start_cache
                    .insert(activity.id.to_string(), activity.start_date);
            }
            let done = batch.len() < PAGE_SIZE as usize;
            all.extend(batch);
            if done {
                break;
            }
        }

        tracing::debug!(count = all.len(), after, "Listed Strava activities");
        Ok(all)
    }

    /// Fetch `latlng` and `time` streams for one activity.
    async fn get_streams(&self, activity_id: &str) -> Result<Option<StravaStreams>, SourceError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("keys", "latlng,time"), ("key_by_type", "true")])
            .send()
            .await
            .map_err(|e| SourceError::TraceFetch {
                id: activity_id.to_string(),
                message: e.to_string(),
            })?;

        // Manual activities have no streams at all.
        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        check_response_json(response)
            .await
            .map(Some)
            .map_err(|e| match e {
                SourceError::NotAuthorized => SourceError::NotAuthorized,
                other => SourceError::TraceFetch {
                    id: activity_id.to_string(),
                    message: other.to_string(),
                },
            })
    }
}

impl ActivitySource for StravaSource {
    async fn request_authorization(&self) -> Result<bool, SourceError> {
        let url = format!("{}/athlete", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        match check_response_json::<StravaAthlete>(response).await {
            Ok(athlete) => {
                tracing::info!(athlete_id = athlete.id, "Strava access confirmed");
                Ok(true)
            }
            Err(SourceError::NotAuthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn query_workouts(
        &self,
        activity_types: &[ActivityType],
        range: DateRange,
    ) -> Result<Vec<WorkoutRecord>, SourceError> {
        let activities = self
            .list_activities(range.start.timestamp() - 1, Some(range.end.timestamp()))
            .await?;

        Ok(activities
            .into_iter()
            .map(StravaActivitySummary::into_record)
            .filter(|w| activity_types.contains(&w.activity_type) && range.contains(w.start_date))
            .collect())
    }

    async fn query_workouts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<WorkoutRecord>, SourceError> {
        let activities = self.list_activities(since.timestamp() - 1, None).await?;
        Ok(activities
            .into_iter()
            .map(StravaActivitySummary::into_record)
            .filter(|w| w.start_date >= since)
            .collect())
    }

    async fn query_trace(&self, workout_id: &str) -> Result<TraceStream, SourceError> {
        let Some(streams) = self.get_streams(workout_id).await? else {
            return Ok(TraceStream::from_chunks(vec![TraceChunk::Done]));
        };

        let start = self.activity_start(workout_id).await?;
        let points = streams.into_points(workout_id, start)?;
        Ok(TraceStream::from_chunks(vec![
            TraceChunk::Segment(points),
            TraceChunk::Done,
        ]))
    }
}

impl StravaSource {
    /// Start time of one activity; stream `time` values are offsets from it.
    async fn activity_start(&self, activity_id: &str) -> Result<DateTime<Utc>, SourceError> {
        if let Some(start) = self.start_cache.get(activity_id).map(|entry| *entry) {
            return Ok(start);
        }

        let url = format!("{}/activities/{}", self.base_url, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SourceError::TraceFetch {
                id: activity_id.to_string(),
                message: e.to_string(),
            })?;

        let activity: StravaActivitySummary =
            check_response_json(response).await.map_err(|e| match e {
                SourceError::NotAuthorized => SourceError::NotAuthorized,
                other => SourceError::TraceFetch {
                    id: activity_id.to_string(),
                    message: other.to_string(),
                },
            })?;
        self.start_cache
            .insert(activity_id.to_string(), activity.start_date);
        Ok(activity.start_date)
    }
}

/// Check response status and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, SourceError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(SourceError::Unavailable("rate limited".to_string()));
        }

        if status.as_u16() == 401 {
            return Err(SourceError::NotAuthorized);
        }

        return Err(SourceError::Unavailable(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| SourceError::Unavailable(format!("JSON parse error: {}", e)))
}

/// Authenticated athlete profile (only the id is used).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    /// Seconds
    pub elapsed_time: i64,
    /// Meters
    pub distance: Option<f64>,
    pub moving_time: Option<f64>,
    pub calories: Option<f64>,
    #[serde(default)]
    pub trainer: bool,
}

impl StravaActivitySummary {
    fn into_record(self) -> WorkoutRecord {
        let activity_type = ActivityType::from_sport_type(&self.sport_type);
        let is_indoor = self.trainer || self.sport_type.starts_with("Virtual");
        WorkoutRecord {
            external_id: self.id.to_string(),
            activity_type,
            start_date: self.start_date,
            end_date: self.start_date + Duration::seconds(self.elapsed_time),
            distance_meters: self.distance,
            duration_seconds: self.moving_time,
            calories_kcal: self.calories,
            is_indoor,
        }
    }
}

/// One stream from the streams endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaStream<T> {
    pub data: Vec<T>,
}

/// `key_by_type=true` response shape.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaStreams {
    pub latlng: Option<StravaStream<[f64; 2]>>,
    pub time: Option<StravaStream<i64>>,
}

impl StravaStreams {
    /// Zip the `latlng` and `time` streams into fixes.
    pub fn into_points(
        self,
        activity_id: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<TracePoint>, SourceError> {
        let (latlng, time) = match (self.latlng, self.time) {
            (Some(latlng), Some(time)) => (latlng.data, time.data),
            (None, _) => return Ok(Vec::new()),
            (Some(_), None) => {
                return Err(SourceError::MalformedSample {
                    id: activity_id.to_string(),
                    reason: "latlng stream without time stream".to_string(),
                })
            }
        };

        if latlng.len() != time.len() {
            return Err(SourceError::MalformedSample {
                id: activity_id.to_string(),
                reason: format!(
                    "stream length mismatch: {} positions, {} times",
                    latlng.len(),
                    time.len()
                ),
            });
        }

        Ok(latlng
            .into_iter()
            .zip(time)
            .map(|([lat, lng], offset)| TracePoint::new(lat, lng, start + Duration::seconds(offset)))
            .collect())
    }
}
