// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Query filter criteria and date ranges.

use crate::models::ActivityType;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The whole UTC calendar day containing `date`.
    pub fn for_day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Everything from the epoch up to now.
    pub fn all_time(now: DateTime<Utc>) -> Self {
        Self {
            start: DateTime::<Utc>::default(),
            end: now,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Filter applied to stored workouts by the query service.
///
/// All date filtering is against the workout's `start_date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Only workouts starting on this UTC day
    pub date: Option<NaiveDate>,
    /// Only these activity types; `None` means every type
    pub activity_types: Option<BTreeSet<ActivityType>>,
    /// Free text from the search box (carried through, not used for matching)
    pub search_text: Option<String>,
}

impl FilterCriteria {
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_types<I: IntoIterator<Item = ActivityType>>(mut self, types: I) -> Self {
        self.activity_types = Some(types.into_iter().collect());
        self
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date.map(DateRange::for_day)
    }

    /// Store-level predicate equivalent to this filter.
    pub fn predicate(&self) -> WorkoutPredicate {
        WorkoutPredicate {
            start_range: self.date_range(),
            activity_types: self
                .activity_types
                .as_ref()
                .map(|types| types.iter().copied().collect()),
        }
    }
}

/// Predicate pushed down to the route store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkoutPredicate {
    pub start_range: Option<DateRange>,
    pub activity_types: Option<Vec<ActivityType>>,
}

impl WorkoutPredicate {
    pub fn matches(&self, start_date: DateTime<Utc>, activity_type: ActivityType) -> bool {
        let in_range = self
            .start_range
            .map_or(true, |range| range.contains(start_date));
        let type_ok = self
            .activity_types
            .as_ref()
            .map_or(true, |types| types.contains(&activity_type));
        in_range && type_ok
    }
}
