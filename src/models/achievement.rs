// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Badge and title catalog entries and grant records.

use crate::models::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Whether an achievement shows up as a badge or as a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    Badge,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Distance,
    Streak,
    Challenge,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Unlock condition for an achievement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AchievementRule {
    /// Lifetime run distance reaches `threshold_km`.
    DistanceMilestone { threshold_km: f64 },
    /// Any enrollment's streak reaches `threshold_days`.
    StreakMilestone { threshold_days: u32 },
    /// A challenge of `tier` has been completed.
    ChallengeTierCompletion { tier: Tier },
    /// At least `count` challenges have been completed.
    ChallengeCompletionCount { count: usize },
    /// Every tier in `tiers` has at least one completed challenge.
    AllTiersCompleted { tiers: Vec<Tier> },
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    /// Stable ID, never reused for a different achievement
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: AchievementKind,
    pub category: AchievementCategory,
    pub rarity: Rarity,
    pub rule: AchievementRule,
}

/// Append-only grant record. Its existence blocks any re-grant of the same ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantedAchievement {
    pub user_id: u64,
    pub achievement_id: String,
    pub kind: AchievementKind,
    pub granted_at: DateTime<Utc>,
}

impl GrantedAchievement {
    /// Document ID for this grant.
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}",
            self.user_id,
            urlencoding::encode(&self.achievement_id)
        )
    }
}
