// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod achievement;
pub mod activity;
pub mod challenge;
pub mod enrollment;
pub mod user;

pub use achievement::{
    AchievementCategory, AchievementDefinition, AchievementKind, AchievementRule,
    GrantedAchievement, Rarity,
};
pub use activity::{ActivityRecord, ActivityType};
pub use challenge::{ChallengeDefinition, ChallengeKind, Tier};
pub use enrollment::Enrollment;
pub use user::{UserAggregate, UserTokens};
