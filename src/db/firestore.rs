// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - User aggregates (XP, level, momentum, processed activity IDs)
//! - Enrollments (per-user challenge progress)
//! - Granted achievements (append-only)
//! - Challenges (catalog)
//! - Tokens (Strava credentials)

use crate::db::collections;
use crate::db::store::{revision_conflict, ProgressStore, SyncCommit, UserSnapshot};
use crate::error::AppError;
use crate::models::enrollment::document_id as enrollment_document_id;
use crate::models::{
    ChallengeDefinition, Enrollment, GrantedAchievement, UserAggregate, UserTokens,
};
use async_trait::async_trait;
use firestore::FirestoreConsistencySelector;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator needs an unauthenticated connection
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Persistence("Database not connected (offline mode)".to_string())
        })
    }

    /// Get the stored aggregate for a user.
    pub async fn get_aggregate(&self, user_id: u64) -> Result<Option<UserAggregate>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_AGGREGATES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Get all enrollments for a user, oldest first.
    pub async fn get_enrollments(&self, user_id: u64) -> Result<Vec<Enrollment>, AppError> {
        let mut enrollments: Vec<Enrollment> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ENROLLMENTS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        // Sorted here to avoid requiring a composite index
        enrollments.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(enrollments)
    }

    /// Get all grants for a user, in grant order.
    pub async fn get_grants(&self, user_id: u64) -> Result<Vec<GrantedAchievement>, AppError> {
        let mut grants: Vec<GrantedAchievement> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::GRANTED_ACHIEVEMENTS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        grants.sort_by(|a, b| a.granted_at.cmp(&b.granted_at));
        Ok(grants)
    }
}

#[async_trait]
impl ProgressStore for FirestoreDb {
    async fn load_snapshot(&self, user_id: u64) -> Result<UserSnapshot, AppError> {
        let (aggregate, enrollments, granted) = tokio::try_join!(
            self.get_aggregate(user_id),
            self.get_enrollments(user_id),
            self.get_grants(user_id),
        )?;

        Ok(UserSnapshot {
            aggregate: aggregate.unwrap_or_default(),
            enrollments,
            granted,
        })
    }

    /// Apply a sync in a single Firestore transaction.
    ///
    /// The revision check rejects the commit if another sync for the same
    /// user committed since this one loaded its snapshot. The check reads
    /// through the transaction, so it also holds across server instances.
    async fn commit_sync(&self, user_id: u64, commit: &SyncCommit) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to begin transaction: {}", e)))?;

        // 1. Re-read the aggregate inside the transaction and check the
        //    revision. The read is tied to the commit, so a concurrent
        //    writer aborts one of the two transactions.
        let stored: Option<UserAggregate> = client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::USER_AGGREGATES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| {
                AppError::Persistence(format!("Failed to read aggregate in transaction: {}", e))
            })?;
        let stored_revision = stored.map(|a| a.revision).unwrap_or(0);

        if stored_revision != commit.base_revision {
            let _ = transaction.rollback().await;
            return Err(revision_conflict(
                user_id,
                commit.base_revision,
                stored_revision,
            ));
        }

        // 2. Enrollments
        for enrollment in &commit.enrollments {
            client
                .fluent()
                .update()
                .in_col(collections::ENROLLMENTS)
                .document_id(enrollment.document_id())
                .object(enrollment)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Persistence(format!(
                        "Failed to add enrollment to transaction: {}",
                        e
                    ))
                })?;
        }

        // 3. Grants
        for grant in &commit.grants {
            client
                .fluent()
                .update()
                .in_col(collections::GRANTED_ACHIEVEMENTS)
                .document_id(grant.document_id())
                .object(grant)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Persistence(format!("Failed to add grant to transaction: {}", e))
                })?;
        }

        // 4. Aggregate
        client
            .fluent()
            .update()
            .in_col(collections::USER_AGGREGATES)
            .document_id(user_id.to_string())
            .object(&commit.aggregate)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Persistence(format!("Failed to add aggregate to transaction: {}", e))
            })?;

        // 5. Commit atomically
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Persistence(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            user_id,
            revision = commit.aggregate.revision,
            enrollments = commit.enrollments.len(),
            grants = commit.grants.len(),
            "Sync committed atomically"
        );

        Ok(())
    }

    async fn list_challenges(&self) -> Result<Vec<ChallengeDefinition>, AppError> {
        let mut challenges: Vec<ChallengeDefinition> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        challenges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(challenges)
    }

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<ChallengeDefinition>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CHALLENGES)
            .obj()
            .one(challenge_id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn upsert_challenge(&self, challenge: &ChallengeDefinition) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CHALLENGES)
            .document_id(&challenge.id)
            .object(challenge)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn enroll(
        &self,
        user_id: u64,
        challenge_id: &str,
    ) -> Result<(Enrollment, bool), AppError> {
        let doc_id = enrollment_document_id(user_id, challenge_id);
        let client = self.get_client()?;

        let existing: Option<Enrollment> = client
            .fluent()
            .select()
            .by_id_in(collections::ENROLLMENTS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        if let Some(enrollment) = existing {
            return Ok((enrollment, false));
        }

        let enrollment = Enrollment::new(user_id, challenge_id, chrono::Utc::now());
        let _: () = client
            .fluent()
            .update()
            .in_col(collections::ENROLLMENTS)
            .document_id(&doc_id)
            .object(&enrollment)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        tracing::info!(user_id, challenge_id, "User enrolled in challenge");
        Ok((enrollment, true))
    }

    async fn get_tokens(&self, user_id: u64) -> Result<Option<UserTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn set_tokens(&self, user_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(user_id.to_string())
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }
}
