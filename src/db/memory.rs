// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.

use crate::db::store::{revision_conflict, ProgressStore, SyncCommit, UserSnapshot};
use crate::error::AppError;
use crate::models::{ChallengeDefinition, Enrollment, GrantedAchievement, UserAggregate, UserTokens};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    aggregates: HashMap<u64, UserAggregate>,
    /// Enrollments per user, in join order
    enrollments: HashMap<u64, Vec<Enrollment>>,
    grants: HashMap<u64, Vec<GrantedAchievement>>,
    challenges: BTreeMap<String, ChallengeDefinition>,
    tokens: HashMap<u64, UserTokens>,
}

/// Memory-backed `ProgressStore`. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store built with a challenge catalog already loaded.
    pub fn with_challenges(challenges: impl IntoIterator<Item = ChallengeDefinition>) -> Self {
        let inner = Inner {
            challenges: challenges.into_iter().map(|c| (c.id.clone(), c)).collect(),
            ..Default::default()
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load_snapshot(&self, user_id: u64) -> Result<UserSnapshot, AppError> {
        let inner = self.inner.read().await;
        Ok(UserSnapshot {
            aggregate: inner.aggregates.get(&user_id).cloned().unwrap_or_default(),
            enrollments: inner.enrollments.get(&user_id).cloned().unwrap_or_default(),
            granted: inner.grants.get(&user_id).cloned().unwrap_or_default(),
        })
    }

    async fn commit_sync(&self, user_id: u64, commit: &SyncCommit) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;

        let stored_revision = inner
            .aggregates
            .get(&user_id)
            .map(|a| a.revision)
            .unwrap_or(0);
        if stored_revision != commit.base_revision {
            return Err(revision_conflict(
                user_id,
                commit.base_revision,
                stored_revision,
            ));
        }

        let enrollments = inner.enrollments.entry(user_id).or_default();
        for updated in &commit.enrollments {
            match enrollments
                .iter_mut()
                .find(|e| e.challenge_id == updated.challenge_id)
            {
                Some(existing) => *existing = updated.clone(),
                None => enrollments.push(updated.clone()),
            }
        }

        let grants = inner.grants.entry(user_id).or_default();
        for grant in &commit.grants {
            if !grants.iter().any(|g| g.achievement_id == grant.achievement_id) {
                grants.push(grant.clone());
            }
        }

        inner.aggregates.insert(user_id, commit.aggregate.clone());
        Ok(())
    }

    async fn list_challenges(&self) -> Result<Vec<ChallengeDefinition>, AppError> {
        Ok(self.inner.read().await.challenges.values().cloned().collect())
    }

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<ChallengeDefinition>, AppError> {
        Ok(self.inner.read().await.challenges.get(challenge_id).cloned())
    }

    async fn upsert_challenge(&self, challenge: &ChallengeDefinition) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .challenges
            .insert(challenge.id.clone(), challenge.clone());
        Ok(())
    }

    async fn enroll(
        &self,
        user_id: u64,
        challenge_id: &str,
    ) -> Result<(Enrollment, bool), AppError> {
        let mut inner = self.inner.write().await;
        let enrollments = inner.enrollments.entry(user_id).or_default();

        if let Some(existing) = enrollments.iter().find(|e| e.challenge_id == challenge_id) {
            return Ok((existing.clone(), false));
        }

        let enrollment = Enrollment::new(user_id, challenge_id, chrono::Utc::now());
        enrollments.push(enrollment.clone());
        Ok((enrollment, true))
    }

    async fn get_tokens(&self, user_id: u64) -> Result<Option<UserTokens>, AppError> {
        Ok(self.inner.read().await.tokens.get(&user_id).cloned())
    }

    async fn set_tokens(&self, user_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .tokens
            .insert(user_id, tokens.clone());
        Ok(())
    }
}
