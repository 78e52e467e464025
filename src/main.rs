// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride Quest API Server
//!
//! Syncs runs from Strava and turns them into challenge progress, XP,
//! levels and achievements.

use std::sync::Arc;
use stride_quest::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryStore, ProgressStore},
    services::{AwardEngine, ProgressEngine, StravaClient, StravaFeed, SyncService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Stride Quest API");

    let store: Arc<dyn ProgressStore> = match config.storage_backend {
        StorageBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; progress is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let feed = Arc::new(StravaFeed::new(
        StravaClient::new(config.strava_api_url.clone()),
        store.clone(),
    ));

    let awards = AwardEngine::default();
    tracing::info!(
        achievements = awards.catalog().len(),
        max_level = config.rules.max_level,
        "Gamification rules loaded"
    );

    let sync = SyncService::new(
        store.clone(),
        feed,
        ProgressEngine::new(config.rules.clone()),
        awards,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        sync,
    });

    // Build router
    let app = stride_quest::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stride_quest=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
