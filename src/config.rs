// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use crate::services::strava::STRAVA_API_URL;
use crate::services::sync::{
    default_concurrency, SyncSettings, DEFAULT_DEADLINE, DEFAULT_LOOKBACK,
    DEFAULT_TOLERANCE_METERS,
};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava access token for the athlete being synced
    pub strava_access_token: String,
    /// Strava API base URL (overridable for local fakes)
    pub strava_api_url: String,
    /// SQLite route store file
    pub database_path: String,
    /// JSON settings file holding the sync watermark
    pub settings_path: String,
    /// Server port
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,

    // --- Sync tuning ---
    /// Minimum time between incremental syncs
    pub sync_min_interval: Duration,
    /// How often the background loop checks whether a sync is due
    pub sync_poll_interval: Duration,
    pub sync_concurrency: usize,
    pub simplify_tolerance_meters: f64,
    pub sync_deadline: Duration,
    /// How far before the watermark incremental syncs look
    pub sync_lookback: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_access_token: "test_access_token".to_string(),
            strava_api_url: STRAVA_API_URL.to_string(),
            database_path: "data/routes.db".to_string(),
            settings_path: "data/settings.json".to_string(),
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            sync_min_interval: Duration::from_secs(3600),
            sync_poll_interval: Duration::from_secs(300),
            sync_concurrency: 2,
            simplify_tolerance_meters: DEFAULT_TOLERANCE_METERS,
            sync_deadline: DEFAULT_DEADLINE,
            sync_lookback: DEFAULT_LOOKBACK,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_access_token: env::var("STRAVA_ACCESS_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_ACCESS_TOKEN"))?,
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| STRAVA_API_URL.to_string()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/routes.db".to_string()),
            settings_path: env::var("SETTINGS_PATH")
                .unwrap_or_else(|_| "data/settings.json".to_string()),
            port: parse_var("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            sync_min_interval: Duration::from_secs(parse_var("SYNC_MIN_INTERVAL_SECS", 3600)?),
            sync_poll_interval: Duration::from_secs(parse_var::<u64>("SYNC_POLL_SECS", 300)?.max(1)),
            sync_concurrency: parse_var("SYNC_CONCURRENCY", default_concurrency())?.max(1),
            simplify_tolerance_meters: parse_var_where(
                "SIMPLIFY_TOLERANCE_METERS",
                DEFAULT_TOLERANCE_METERS,
                |t: &f64| t.is_finite() && *t >= 0.0,
            )?,
            sync_deadline: Duration::from_secs(parse_var_where(
                "SYNC_DEADLINE_SECS",
                DEFAULT_DEADLINE.as_secs(),
                |secs: &u64| *secs > 0,
            )?),
            sync_lookback: Duration::from_secs(parse_var(
                "SYNC_LOOKBACK_SECS",
                DEFAULT_LOOKBACK.as_secs(),
            )?),
        })
    }

    /// Coordinator settings derived from this config.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            concurrency: self.sync_concurrency,
            tolerance_meters: self.simplify_tolerance_meters,
            deadline: self.sync_deadline,
            lookback: self.sync_lookback,
        }
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    parse_var_where(name, default, |_| true)
}

/// Like [`parse_var`], but a set value must also pass `valid`.
fn parse_var_where<T: FromStr>(
    name: &'static str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) if valid(&value) => Ok(value),
            _ => Err(ConfigError::Invalid { name, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
