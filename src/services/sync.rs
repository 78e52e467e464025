// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestration: the single batch entry point for a user.
//!
//! A sync loads the user's snapshot, fetches activities after the
//! watermark, runs the progress and award engines on in-memory copies and
//! commits everything in one atomic write. Nothing is applied if the
//! commit fails; the caller retries the whole sync.

use crate::db::{ProgressStore, SyncCommit};
use crate::error::AppError;
use crate::models::{ActivityRecord, ChallengeDefinition, Enrollment};
use crate::services::awards::{AwardEngine, EnrolledChallenge};
use crate::services::progress::ProgressEngine;
use crate::services::strava::ActivityFeed;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Maximum concurrent challenge lookups during a sync.
const MAX_CONCURRENT_DB_OPS: usize = 8;

/// Shared per-user sync locks.
pub type SyncLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// What a sync changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncSummary {
    /// New runs applied
    pub activities_count: usize,
    pub xp_added: f64,
    pub challenges_updated: Vec<String>,
    pub challenges_completed: Vec<String>,
    pub new_badges: Vec<String>,
    pub new_titles: Vec<String>,
    pub level: u32,
    pub leveled_up: bool,
}

/// Runs syncs for users, one at a time per user.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn ProgressStore>,
    feed: Arc<dyn ActivityFeed>,
    engine: ProgressEngine,
    awards: AwardEngine,
    /// Per-user mutex so two syncs for one user never interleave.
    locks: SyncLocks,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        feed: Arc<dyn ActivityFeed>,
        engine: ProgressEngine,
        awards: AwardEngine,
    ) -> Self {
        Self {
            store,
            feed,
            engine,
            awards,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn awards(&self) -> &AwardEngine {
        &self.awards
    }

    /// Sync one user.
    ///
    /// Returns `Persistence` if the commit failed (including a revision
    /// conflict); in that case no state was changed.
    pub async fn sync_user(&self, user_id: u64) -> Result<SyncSummary, AppError> {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.sync_locked(user_id).await
        };

        // Drop the entry unless another sync for this user is waiting on it
        drop(lock);
        self.locks
            .remove_if(&user_id, |_, entry| Arc::strong_count(entry) == 1);

        result
    }

    async fn sync_locked(&self, user_id: u64) -> Result<SyncSummary, AppError> {
        let snapshot = self.store.load_snapshot(user_id).await?;
        let challenges = self.load_challenges(&snapshot.enrollments).await?;

        let now = Utc::now();
        let after = snapshot
            .aggregate
            .last_sync_at
            .unwrap_or_else(|| first_sync_cursor(&snapshot.enrollments, now));

        let fetched = self.feed.fetch_activities(user_id, after).await?;
        let fetched_count = fetched.len();

        let activities: Vec<ActivityRecord> = fetched
            .into_iter()
            .filter_map(|summary| {
                let activity_id = summary.id;
                match ActivityRecord::try_from(summary) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(user_id, activity_id, error = %e, "Skipping invalid activity");
                        None
                    }
                }
            })
            .collect();

        let base_revision = snapshot.aggregate.revision;
        let mut aggregate = snapshot.aggregate.clone();
        let mut enrollments = snapshot.enrollments.clone();

        let outcome =
            self.engine
                .apply_batch(&mut aggregate, &mut enrollments, &challenges, &activities);
        aggregate.advance_watermark(after);

        let mut granted = snapshot.granted.clone();
        let held = granted.len();
        let enrolled: Vec<EnrolledChallenge<'_>> = enrollments
            .iter()
            .map(|enrollment| EnrolledChallenge {
                enrollment,
                tier: challenges.get(&enrollment.challenge_id).map(|c| &c.tier),
            })
            .collect();
        let awarded = self
            .awards
            .evaluate(user_id, &aggregate, &enrolled, &mut granted, now);
        let new_grants = granted.split_off(held);

        let changed_enrollments: Vec<_> = enrollments
            .into_iter()
            .filter(|e| outcome.challenges_updated.contains(&e.challenge_id))
            .map(|mut e| {
                e.updated_at = Some(now);
                e
            })
            .collect();

        let summary = SyncSummary {
            activities_count: outcome.activities_processed,
            xp_added: outcome.xp_added,
            challenges_updated: outcome.challenges_updated,
            challenges_completed: outcome.challenges_completed,
            new_badges: awarded.new_badges,
            new_titles: awarded.new_titles,
            level: aggregate.level,
            leveled_up: outcome.leveled_up,
        };

        if aggregate == snapshot.aggregate && new_grants.is_empty() && changed_enrollments.is_empty()
        {
            tracing::debug!(user_id, fetched_count, "Nothing new to commit");
            return Ok(summary);
        }

        aggregate.revision = base_revision + 1;
        aggregate.updated_at = Some(now);

        let commit = SyncCommit {
            base_revision,
            aggregate,
            enrollments: changed_enrollments,
            grants: new_grants,
        };
        self.store.commit_sync(user_id, &commit).await?;

        tracing::info!(
            user_id,
            fetched_count,
            activities = summary.activities_count,
            xp_added = summary.xp_added,
            level = summary.level,
            badges = summary.new_badges.len(),
            titles = summary.new_titles.len(),
            "Sync complete"
        );

        Ok(summary)
    }

    /// Load the definitions of every challenge the user is enrolled in.
    async fn load_challenges(
        &self,
        enrollments: &[Enrollment],
    ) -> Result<HashMap<String, ChallengeDefinition>, AppError> {
        let store = &self.store;

        let lookups: Vec<_> = enrollments
            .iter()
            .map(|e| store.get_challenge(e.challenge_id.as_str()))
            .collect();
        let loaded = stream::iter(lookups)
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<ChallengeDefinition>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(loaded
            .into_iter()
            .flatten()
            .map(|c| (c.id.clone(), c))
            .collect())
    }
}

/// Feed cursor for a user who has never synced.
///
/// History from before the earliest enrollment is never fetched; a user
/// with no enrollments starts from `now`.
fn first_sync_cursor(enrollments: &[Enrollment], now: DateTime<Utc>) -> DateTime<Utc> {
    enrollments
        .iter()
        .map(|e| e.joined_at)
        .min()
        .unwrap_or(now)
}
