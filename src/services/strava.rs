// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and the activity feed built on it.
//!
//! Handles:
//! - Paginated activity listing after a cursor
//! - Rate limit and token error detection
//!
//! Token acquisition and refresh belong to the OAuth collaborator; this
//! module only reads whatever access token it has stored.

use crate::db::ProgressStore;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Activities requested per page (Strava's maximum).
pub const PAGE_SIZE: u32 = 200;

/// Upper bound on pages fetched in one sync.
pub const MAX_PAGES: u32 = 10;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
}

impl StravaClient {
    /// Create a client against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// List the athlete's activities (paginated).
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: Option<i64>, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            // Unauthorized - token may be expired or revoked
            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(
                    AppError::STRAVA_TOKEN_ERROR.to_string(),
                ));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Summary activity for list endpoints.
///
/// Strava sends both the legacy `type` and the newer `sport_type`; either
/// may be missing on older records.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub sport_type: Option<String>,
    pub start_date: String,
    /// Meters
    pub distance: f64,
}

/// Source of a user's activities.
#[async_trait]
pub trait ActivityFeed: Send + Sync {
    /// Fetch all activities that started strictly after `after`.
    ///
    /// With a cursor set Strava returns the oldest activities first, so
    /// whatever a page limit leaves behind is picked up by the next sync.
    async fn fetch_activities(
        &self,
        user_id: u64,
        after: DateTime<Utc>,
    ) -> Result<Vec<StravaActivitySummary>, AppError>;
}

/// Activity feed backed by the Strava API.
#[derive(Clone)]
pub struct StravaFeed {
    client: StravaClient,
    store: Arc<dyn ProgressStore>,
}

impl StravaFeed {
    pub fn new(client: StravaClient, store: Arc<dyn ProgressStore>) -> Self {
        Self { client, store }
    }

    /// Read the stored access token, rejecting one that is known to be expired.
    async fn access_token(&self, user_id: u64) -> Result<String, AppError> {
        let tokens = self
            .store
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Strava tokens for user {}", user_id)))?;

        if token_expired(tokens.expires_at.as_deref(), Utc::now()) {
            tracing::warn!(user_id, "Stored Strava token has expired");
            return Err(AppError::StravaApi(
                AppError::STRAVA_TOKEN_ERROR.to_string(),
            ));
        }

        Ok(tokens.access_token)
    }
}

#[async_trait]
impl ActivityFeed for StravaFeed {
    async fn fetch_activities(
        &self,
        user_id: u64,
        after: DateTime<Utc>,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let access_token = self.access_token(user_id).await?;
        let after = Some(after.timestamp());

        let mut activities = Vec::new();
        for page in 1..=MAX_PAGES {
            let batch = self
                .client
                .list_activities(&access_token, after, page, PAGE_SIZE)
                .await?;
            let fetched = batch.len();
            activities.extend(batch);

            if fetched < PAGE_SIZE as usize {
                break;
            }
            if page == MAX_PAGES {
                tracing::warn!(
                    user_id,
                    fetched = activities.len(),
                    "Page limit reached; remaining activities left for the next sync"
                );
            }
        }

        tracing::debug!(user_id, count = activities.len(), "Fetched activities");
        Ok(activities)
    }
}

/// Whether an RFC 3339 expiry is in the past. Unparseable or missing
/// expiries are treated as still valid and left for Strava to reject.
fn token_expired(expires_at: Option<&str>, now: DateTime<Utc>) -> bool {
    expires_at
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .is_some_and(|t| t.with_timezone(&Utc) <= now)
}
