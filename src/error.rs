// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the source, store and sync layers, plus the HTTP-facing
//! application error with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// Errors reported by an activity source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The source is disabled or unreachable
    #[error("Activity source unavailable: {0}")]
    Unavailable(String),

    /// The user denied (or revoked) access to their workouts
    #[error("Not authorized to read workouts")]
    NotAuthorized,

    /// A record or sample had an unexpected shape
    #[error("Malformed sample for workout {id}: {reason}")]
    MalformedSample { id: String, reason: String },

    /// A single workout's trace could not be read
    #[error("Trace fetch failed for workout {id}: {message}")]
    TraceFetch { id: String, message: String },
}

/// Errors reported by the route store or the watermark settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(String),

    /// A handle from a different write context was used
    #[error("Unknown workout handle for {0}")]
    UnknownHandle(String),
}

/// Errors that fail a whole sync operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("Activity source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Not authorized to read workouts")]
    NotAuthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Sync cycle exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl From<SourceError> for SyncError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotAuthorized => SyncError::NotAuthorized,
            SourceError::Unavailable(msg) => SyncError::SourceUnavailable(msg),
            // Per-item errors only reach here when the batch itself was bad.
            other => SyncError::SourceUnavailable(other.to_string()),
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Activity source authorization required")]
    NotAuthorized,

    #[error("Activity source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotAuthorized => AppError::NotAuthorized,
            SyncError::SourceUnavailable(msg) => AppError::SourceUnavailable(msg),
            SyncError::Store(e) => AppError::Database(e.to_string()),
            SyncError::DeadlineExceeded(d) => {
                AppError::Internal(anyhow::anyhow!("Sync deadline of {:?} exceeded", d))
            }
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::NotAuthorized => (StatusCode::UNAUTHORIZED, "source_not_authorized", None),
            AppError::SourceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "source_unavailable",
                Some(msg.clone()),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
