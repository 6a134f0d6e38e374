// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Route-Sync: ingest, simplify and serve GPS workout routes
//!
//! This crate pulls workouts and raw GPS traces from an activity source,
//! thins each trace while keeping its shape, merges the result into a local
//! route store and serves filtered routes over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::RouteStore;
use services::{ActivitySource, RouteQueryService, SyncCoordinator};
use std::sync::Arc;

/// Shared application state.
pub struct AppState<A, S> {
    pub config: Config,
    pub sync: Arc<SyncCoordinator<A, S>>,
    pub query: RouteQueryService<S>,
}

impl<A: ActivitySource, S: RouteStore> AppState<A, S> {
    /// Wire a query service onto the coordinator's store.
    pub fn new(config: Config, sync: Arc<SyncCoordinator<A, S>>) -> Self {
        let query = RouteQueryService::new(Arc::clone(sync.store()));
        Self {
            config,
            sync,
            query,
        }
    }
}
