// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage boundary for progress data.
//!
//! Stores hand out fully materialized values. The core never loads
//! anything lazily behind the caller's back.

use crate::error::AppError;
use crate::models::{
    ChallengeDefinition, Enrollment, GrantedAchievement, UserAggregate, UserTokens,
};
use async_trait::async_trait;

/// Everything a sync needs for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSnapshot {
    pub aggregate: UserAggregate,
    pub enrollments: Vec<Enrollment>,
    pub granted: Vec<GrantedAchievement>,
}

impl UserSnapshot {
    pub fn has_granted(&self, achievement_id: &str) -> bool {
        self.granted.iter().any(|g| g.achievement_id == achievement_id)
    }
}

/// Writes produced by one sync, applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct SyncCommit {
    /// Aggregate revision the sync started from
    pub base_revision: u64,
    /// New aggregate; its `revision` is `base_revision + 1`
    pub aggregate: UserAggregate,
    /// Enrollments changed by the sync
    pub enrollments: Vec<Enrollment>,
    /// Grants created by the sync
    pub grants: Vec<GrantedAchievement>,
}

/// Persistence for aggregates, enrollments, grants and the challenge catalog.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load a user's aggregate, enrollments and grants.
    ///
    /// A user with nothing stored gets a default snapshot.
    async fn load_snapshot(&self, user_id: u64) -> Result<UserSnapshot, AppError>;

    /// Atomically apply a sync.
    ///
    /// Fails with `AppError::Persistence` and writes nothing if the stored
    /// aggregate revision no longer equals `commit.base_revision`.
    async fn commit_sync(&self, user_id: u64, commit: &SyncCommit) -> Result<(), AppError>;

    async fn list_challenges(&self) -> Result<Vec<ChallengeDefinition>, AppError>;

    async fn get_challenge(&self, challenge_id: &str)
        -> Result<Option<ChallengeDefinition>, AppError>;

    async fn upsert_challenge(&self, challenge: &ChallengeDefinition) -> Result<(), AppError>;

    /// Enroll a user in a challenge.
    ///
    /// Returns the enrollment and whether it was newly created. Enrolling
    /// twice returns the existing record unchanged.
    async fn enroll(
        &self,
        user_id: u64,
        challenge_id: &str,
    ) -> Result<(Enrollment, bool), AppError>;

    /// Strava credentials stored for a user.
    async fn get_tokens(&self, user_id: u64) -> Result<Option<UserTokens>, AppError>;

    async fn set_tokens(&self, user_id: u64, tokens: &UserTokens) -> Result<(), AppError>;
}

/// Build the revision-conflict error used by every store.
pub(crate) fn revision_conflict(user_id: u64, expected: u64, found: u64) -> AppError {
    AppError::Persistence(format!(
        "Concurrent update for user {}: expected revision {}, found {}",
        user_id, expected, found
    ))
}
