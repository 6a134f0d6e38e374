// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod filter;
pub mod sync;
pub mod views;
pub mod workout;

pub use filter::{DateRange, FilterCriteria, WorkoutPredicate};
pub use sync::{FailureKind, ItemFailure, SyncPhase, SyncReport, SyncStatus};
pub use views::{Polyline, RouteDisplayInfo, RouteSummaryInfo};
pub use workout::{ActivityType, RoutePoint, TracePoint, WorkoutRecord};
