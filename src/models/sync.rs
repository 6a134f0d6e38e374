// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync state published to callers, and per-cycle reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinator mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
}

/// Why a single workout was left out of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source handed us a record or stream we could not make sense of
    MalformedSample,
    /// The workout's trace could not be fetched this time
    PartialFetchFailure,
}

/// A per-item failure that was absorbed instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub external_id: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn malformed(external_id: &str, message: impl Into<String>) -> Self {
        Self {
            external_id: external_id.to_string(),
            kind: FailureKind::MalformedSample,
            message: message.into(),
        }
    }

    pub fn partial_fetch(external_id: &str, message: impl Into<String>) -> Self {
        Self {
            external_id: external_id.to_string(),
            kind: FailureKind::PartialFetchFailure,
            message: message.into(),
        }
    }
}

/// Outcome of one committed sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Cycle start, which becomes the new watermark
    pub started_at: DateTime<Utc>,
    /// Workouts returned by the source
    pub fetched: usize,
    /// Workouts written in the commit
    pub staged: usize,
    /// Workouts skipped this cycle
    pub failures: Vec<ItemFailure>,
    /// Fixes received before simplification
    pub raw_points: usize,
    /// Points written after simplification
    pub stored_points: usize,
    pub elapsed_ms: u64,
}

/// Snapshot of coordinator state for presentation layers.
///
/// Published as a whole through a watch channel, so readers always see a
/// consistent phase/date/report triple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub last_report: Option<SyncReport>,
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        self.phase == SyncPhase::Syncing
    }
}
