//! Per-user gamification aggregate and stored Strava credentials.

use crate::models::ActivityRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Aggregate progression state for a user.
///
/// Stored at: `user_aggregates/{user_id}`
///
/// `level` is a cache of `level_for(xp)` and is only written by
/// `leveling::check_level_up`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAggregate {
    #[serde(default)]
    pub xp: f64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub momentum: u64,
    /// Total run distance across all syncs (km)
    #[serde(default)]
    pub total_distance_km: f64,
    #[serde(default)]
    pub total_runs: u32,
    /// Feed cursor: latest activity start seen by a sync
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,

    // ─── Idempotency ─────────────────────────────────────────────
    /// Set of processed activity IDs (for duplicate detection)
    #[serde(default)]
    pub processed_activity_ids: HashSet<u64>,
    /// Bumped on every commit; used to reject stale writes
    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_level() -> u32 {
    1
}

impl Default for UserAggregate {
    fn default() -> Self {
        Self {
            xp: 0.0,
            level: default_level(),
            momentum: 0,
            total_distance_km: 0.0,
            total_runs: 0,
            last_sync_at: None,
            processed_activity_ids: HashSet::new(),
            revision: 0,
            updated_at: None,
        }
    }
}

impl UserAggregate {
    /// Whether an activity has already been applied by an earlier sync.
    pub fn has_processed(&self, activity_id: u64) -> bool {
        self.processed_activity_ids.contains(&activity_id)
    }

    /// Add a run to the lifetime totals.
    ///
    /// Returns `false` (and changes nothing) if the run was already recorded.
    pub fn record_run(&mut self, activity: &ActivityRecord) -> bool {
        if !self.processed_activity_ids.insert(activity.id) {
            return false;
        }
        self.total_runs += 1;
        self.total_distance_km += activity.distance_km;
        true
    }

    /// Move the feed cursor forward. Never moves it backwards.
    pub fn advance_watermark(&mut self, seen: DateTime<Utc>) {
        if self.last_sync_at.is_none_or(|current| seen > current) {
            self.last_sync_at = Some(seen);
        }
    }
}

/// Strava credentials written by the OAuth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokens {
    pub access_token: String,
    /// When the access token expires (ISO 8601)
    #[serde(default)]
    pub expires_at: Option<String>,
}
