// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stride Quest: gamified running challenges on top of Strava
//!
//! This crate turns a user's Strava runs into challenge progress, XP,
//! levels, streaks, badges and titles, and serves them over a small API.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod rules;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ProgressStore;
use services::SyncService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProgressStore>,
    pub sync: SyncService,
}
