// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ingestion;
pub mod query;
pub mod simplifier;
pub mod source;
pub mod strava;
pub mod sync;

pub use ingestion::{IngestBatch, IngestionService, PendingWorkout};
pub use query::RouteQueryService;
pub use source::{ActivitySource, InMemorySource, TraceChunk, TraceStream};
pub use strava::StravaSource;
pub use sync::{SyncCoordinator, SyncSettings};
