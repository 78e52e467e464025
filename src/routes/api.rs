// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    AchievementCategory, AchievementKind, ChallengeDefinition, ChallengeKind, Enrollment, Rarity,
    Tier,
};
use crate::services::leveling::{is_at_max_level, xp_for_next_level};
use crate::services::SyncSummary;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/sync", post(sync))
        .route("/api/challenges", get(list_challenges))
        .route("/api/challenges/my", get(my_challenges))
        .route("/api/challenges/{id}/join", post(join_challenge))
        .route("/api/achievements", get(list_achievements))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user's progression.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub user_id: u64,
    pub xp: f64,
    pub level: u32,
    /// XP at which the next level starts; `None` at the level cap
    pub next_level_xp: Option<f64>,
    pub at_max_level: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub momentum: u64,
    pub total_distance_km: f64,
    pub total_runs: u32,
    pub last_sync_at: Option<String>,
    pub badges: Vec<String>,
    pub titles: Vec<String>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let snapshot = state.store.load_snapshot(user.user_id).await?;
    let aggregate = snapshot.aggregate;

    let (titles, badges): (Vec<_>, Vec<_>) = snapshot
        .granted
        .into_iter()
        .partition(|g| g.kind == AchievementKind::Title);

    Ok(Json(ProfileResponse {
        user_id: user.user_id,
        xp: aggregate.xp,
        level: aggregate.level,
        next_level_xp: xp_for_next_level(aggregate.level, &state.config.rules),
        at_max_level: is_at_max_level(&aggregate, &state.config.rules),
        momentum: aggregate.momentum,
        total_distance_km: aggregate.total_distance_km,
        total_runs: aggregate.total_runs,
        last_sync_at: aggregate.last_sync_at.map(format_utc_rfc3339),
        badges: badges.into_iter().map(|g| g.achievement_id).collect(),
        titles: titles.into_iter().map(|g| g.achievement_id).collect(),
    }))
}

// ─── Sync ────────────────────────────────────────────────────

/// Pull new activities and apply them.
async fn sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncSummary>> {
    tracing::info!(user_id = user.user_id, "User-initiated sync");
    let summary = state.sync.sync_user(user.user_id).await?;
    Ok(Json(summary))
}

// ─── Challenges ──────────────────────────────────────────────

/// Challenge as shown to users.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChallengeResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tier: String,
    pub kind: ChallengeKind,
    pub sport: String,
    pub goal_km: f64,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
}

impl ChallengeResponse {
    fn new(challenge: &ChallengeDefinition, state: &AppState) -> Self {
        Self {
            id: challenge.id.clone(),
            name: challenge.name.clone(),
            description: challenge.description.clone(),
            tier: challenge.tier.to_string(),
            kind: challenge.kind,
            sport: challenge.sport.clone(),
            goal_km: challenge.goal_km(&state.config.rules),
            starts_at: challenge.starts_at.map(format_utc_rfc3339),
            ends_at: challenge.ends_at.map(format_utc_rfc3339),
        }
    }
}

#[derive(Deserialize)]
struct ChallengesQuery {
    /// Filter by tier name
    tier: Option<String>,
    #[serde(alias = "type")]
    kind: Option<ChallengeKind>,
    /// Filter by sport (case-insensitive)
    sport: Option<String>,
}

impl ChallengesQuery {
    fn matches(&self, challenge: &ChallengeDefinition, tier: Option<&Tier>) -> bool {
        tier.is_none_or(|t| &challenge.tier == t)
            && self.kind.is_none_or(|k| challenge.kind == k)
            && self
                .sport
                .as_deref()
                .is_none_or(|s| challenge.sport.eq_ignore_ascii_case(s))
    }
}

/// List active challenges, optionally filtered by tier, kind and sport.
async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChallengesQuery>,
) -> Result<Json<Vec<ChallengeResponse>>> {
    let tier = params.tier.as_deref().map(Tier::from);

    let challenges = state
        .store
        .list_challenges()
        .await?
        .iter()
        .filter(|c| c.active)
        .filter(|c| params.matches(c, tier.as_ref()))
        .map(|c| ChallengeResponse::new(c, &state))
        .collect();

    Ok(Json(challenges))
}

/// A user's enrollment joined with its challenge.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EnrollmentResponse {
    /// `None` if the challenge has been removed from the catalog
    pub challenge: Option<ChallengeResponse>,
    pub challenge_id: String,
    pub distance_completed_km: f64,
    pub streak_days: u32,
    pub xp_earned: f64,
    pub completed: bool,
    pub joined_at: String,
    pub last_progress_at: Option<String>,
}

impl EnrollmentResponse {
    fn new(enrollment: Enrollment, challenge: Option<ChallengeResponse>) -> Self {
        Self {
            challenge,
            challenge_id: enrollment.challenge_id,
            distance_completed_km: enrollment.distance_completed_km,
            streak_days: enrollment.streak_days,
            xp_earned: enrollment.xp_earned,
            completed: enrollment.completed,
            joined_at: format_utc_rfc3339(enrollment.joined_at),
            last_progress_at: enrollment.last_progress_at.map(format_utc_rfc3339),
        }
    }
}

/// List the current user's enrollments.
async fn my_challenges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<EnrollmentResponse>>> {
    let (snapshot, catalog) = tokio::try_join!(
        state.store.load_snapshot(user.user_id),
        state.store.list_challenges(),
    )?;
    let catalog: HashMap<_, _> = catalog.iter().map(|c| (c.id.as_str(), c)).collect();

    let enrollments = snapshot
        .enrollments
        .into_iter()
        .map(|e| {
            let challenge = catalog
                .get(e.challenge_id.as_str())
                .map(|c| ChallengeResponse::new(c, &state));
            EnrollmentResponse::new(e, challenge)
        })
        .collect();

    Ok(Json(enrollments))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JoinResponse {
    pub enrollment: EnrollmentResponse,
    /// `false` if the user was already enrolled
    pub created: bool,
}

/// Enroll the current user in a challenge.
async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
) -> Result<Json<JoinResponse>> {
    let challenge = state
        .store
        .get_challenge(&challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Challenge {}", challenge_id)))?;

    if !challenge.active {
        return Err(AppError::InvalidInput(format!(
            "Challenge {} is not open for enrollment",
            challenge_id
        )));
    }

    let (enrollment, created) = state.store.enroll(user.user_id, &challenge.id).await?;
    if created {
        tracing::info!(user_id = user.user_id, challenge_id = %challenge.id, "Joined challenge");
    }

    let view = ChallengeResponse::new(&challenge, &state);
    Ok(Json(JoinResponse {
        enrollment: EnrollmentResponse::new(enrollment, Some(view)),
        created,
    }))
}

// ─── Achievements ────────────────────────────────────────────

/// Catalog entry with the user's grant status.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AchievementResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: AchievementKind,
    pub category: AchievementCategory,
    pub rarity: Rarity,
    /// When the user earned it; `None` if not yet earned
    pub granted_at: Option<String>,
}

/// List the achievement catalog, marking the ones the user holds.
async fn list_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AchievementResponse>>> {
    let snapshot = state.store.load_snapshot(user.user_id).await?;
    let granted: HashMap<_, _> = snapshot
        .granted
        .iter()
        .map(|g| (g.achievement_id.as_str(), g.granted_at))
        .collect();

    let achievements = state
        .sync
        .awards()
        .catalog()
        .iter()
        .map(|d| AchievementResponse {
            id: d.id.clone(),
            name: d.name.clone(),
            description: d.description.clone(),
            kind: d.kind,
            category: d.category,
            rarity: d.rarity,
            granted_at: granted.get(d.id.as_str()).copied().map(format_utc_rfc3339),
        })
        .collect();

    Ok(Json(achievements))
}
