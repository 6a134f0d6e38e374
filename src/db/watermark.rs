// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync watermark persistence, kept outside the route store.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key-value settings slot holding the last successful sync time.
pub trait WatermarkStore: Send + Sync {
    fn load(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
    fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    last_sync_date: Option<DateTime<Utc>>,
}

/// Watermark stored in a small JSON settings file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_settings(&self) -> Result<Settings, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Io(format!("corrupt settings file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.read_settings()?.last_sync_date)
    }

    fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut settings = self.read_settings()?;
        settings.last_sync_date = Some(at);

        let body =
            serde_json::to_vec_pretty(&settings).map_err(|e| StoreError::Io(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!(path = %self.path.display(), last_sync_date = %at, "Saved sync watermark");
        Ok(())
    }
}

/// Watermark held in memory.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    value: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(at: DateTime<Utc>) -> Self {
        Self {
            value: Mutex::new(Some(at)),
        }
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.value
            .lock()
            .map(|v| *v)
            .map_err(|_| StoreError::Io("watermark lock poisoned".to_string()))
    }

    fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut value = self
            .value
            .lock()
            .map_err(|_| StoreError::Io("watermark lock poisoned".to_string()))?;
        *value = Some(at);
        Ok(())
    }
}
