// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Badge and title unlocks.
//!
//! Rules are checked in catalog order. A rule whose ID already has a grant
//! record is never evaluated again, so re-running against unchanged state
//! grants nothing.

use crate::models::{
    AchievementCategory, AchievementDefinition, AchievementKind, AchievementRule, Enrollment,
    GrantedAchievement, Rarity, Tier, UserAggregate,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Lifetime distance milestones (km) in the default catalog.
const DISTANCE_MILESTONES_KM: [u32; 4] = [10, 25, 50, 100];
/// Streak milestones (days) in the default catalog.
const STREAK_MILESTONES_DAYS: [u32; 3] = [3, 7, 14];

/// An enrollment together with its challenge tier, if the challenge is known.
#[derive(Debug, Clone, Copy)]
pub struct EnrolledChallenge<'a> {
    pub enrollment: &'a Enrollment,
    pub tier: Option<&'a Tier>,
}

/// Achievements unlocked by one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AwardOutcome {
    pub new_badges: Vec<String>,
    pub new_titles: Vec<String>,
}

impl AwardOutcome {
    pub fn is_empty(&self) -> bool {
        self.new_badges.is_empty() && self.new_titles.is_empty()
    }
}

/// Evaluates the achievement catalog against a user's progress.
#[derive(Debug, Clone)]
pub struct AwardEngine {
    catalog: Vec<AchievementDefinition>,
}

impl Default for AwardEngine {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl AwardEngine {
    pub fn new(catalog: Vec<AchievementDefinition>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &[AchievementDefinition] {
        &self.catalog
    }

    /// Grant every achievement whose rule now holds and that the user does
    /// not have yet.
    ///
    /// New grant records are appended to `granted`.
    pub fn evaluate(
        &self,
        user_id: u64,
        aggregate: &UserAggregate,
        enrollments: &[EnrolledChallenge<'_>],
        granted: &mut Vec<GrantedAchievement>,
        now: DateTime<Utc>,
    ) -> AwardOutcome {
        let mut held: HashSet<String> = granted.iter().map(|g| g.achievement_id.clone()).collect();
        let mut outcome = AwardOutcome::default();

        for definition in &self.catalog {
            if held.contains(&definition.id) {
                continue;
            }
            if !rule_holds(&definition.rule, aggregate, enrollments) {
                continue;
            }

            held.insert(definition.id.clone());
            granted.push(GrantedAchievement {
                user_id,
                achievement_id: definition.id.clone(),
                kind: definition.kind,
                granted_at: now,
            });
            match definition.kind {
                AchievementKind::Badge => outcome.new_badges.push(definition.id.clone()),
                AchievementKind::Title => outcome.new_titles.push(definition.id.clone()),
            }

            tracing::info!(
                user_id,
                achievement_id = %definition.id,
                kind = ?definition.kind,
                "Achievement granted"
            );
        }

        outcome
    }
}

fn rule_holds(
    rule: &AchievementRule,
    aggregate: &UserAggregate,
    enrollments: &[EnrolledChallenge<'_>],
) -> bool {
    match rule {
        AchievementRule::DistanceMilestone { threshold_km } => {
            aggregate.total_distance_km >= *threshold_km
        }
        AchievementRule::StreakMilestone { threshold_days } => enrollments
            .iter()
            .map(|e| e.enrollment.streak_days)
            .max()
            .is_some_and(|best| best >= *threshold_days),
        AchievementRule::ChallengeTierCompletion { tier } => completed_tiers(enrollments).contains(tier),
        AchievementRule::ChallengeCompletionCount { count } => {
            enrollments.iter().filter(|e| e.enrollment.completed).count() >= *count
        }
        AchievementRule::AllTiersCompleted { tiers } => {
            let completed = completed_tiers(enrollments);
            tiers.iter().all(|t| completed.contains(t))
        }
    }
}

fn completed_tiers<'a>(enrollments: &[EnrolledChallenge<'a>]) -> HashSet<&'a Tier> {
    enrollments
        .iter()
        .filter(|e| e.enrollment.completed)
        .filter_map(|e| e.tier)
        .collect()
}

/// The built-in catalog, in evaluation order.
pub fn default_catalog() -> Vec<AchievementDefinition> {
    let mut catalog = Vec::new();

    for km in DISTANCE_MILESTONES_KM {
        catalog.push(AchievementDefinition {
            id: format!("distance_{}km", km),
            name: format!("{}km Milestone", km),
            description: format!("Ran {} km in total.", km),
            kind: AchievementKind::Badge,
            category: AchievementCategory::Distance,
            rarity: match km {
                0..=10 => Rarity::Common,
                11..=25 => Rarity::Uncommon,
                26..=50 => Rarity::Rare,
                _ => Rarity::Epic,
            },
            rule: AchievementRule::DistanceMilestone {
                threshold_km: f64::from(km),
            },
        });
    }

    for days in STREAK_MILESTONES_DAYS {
        catalog.push(AchievementDefinition {
            id: format!("streak_{}d", days),
            name: format!("{}-Day Streak", days),
            description: format!("Ran on {} consecutive days in a challenge.", days),
            kind: AchievementKind::Badge,
            category: AchievementCategory::Streak,
            rarity: match days {
                0..=3 => Rarity::Common,
                4..=7 => Rarity::Uncommon,
                _ => Rarity::Rare,
            },
            rule: AchievementRule::StreakMilestone {
                threshold_days: days,
            },
        });
    }

    for tier in Tier::STANDARD {
        catalog.push(AchievementDefinition {
            id: format!("{}_complete", tier.as_str().to_lowercase()),
            name: format!("{} Challenge Complete", tier),
            description: format!("Completed a {} challenge.", tier),
            kind: AchievementKind::Badge,
            category: AchievementCategory::Challenge,
            rarity: match tier {
                Tier::Sprint => Rarity::Common,
                Tier::Marathon => Rarity::Uncommon,
                Tier::Ultra => Rarity::Rare,
                _ => Rarity::Epic,
            },
            rule: AchievementRule::ChallengeTierCompletion { tier },
        });
    }

    catalog.push(AchievementDefinition {
        id: "steady_strider".to_string(),
        name: "Steady Strider".to_string(),
        description: "Completed your first challenge.".to_string(),
        kind: AchievementKind::Title,
        category: AchievementCategory::Challenge,
        rarity: Rarity::Uncommon,
        rule: AchievementRule::ChallengeCompletionCount { count: 1 },
    });

    catalog.push(AchievementDefinition {
        id: "tier_master".to_string(),
        name: "Tier Master".to_string(),
        description: "Completed a challenge in every tier.".to_string(),
        kind: AchievementKind::Title,
        category: AchievementCategory::Special,
        rarity: Rarity::Legendary,
        rule: AchievementRule::AllTiersCompleted {
            tiers: Tier::STANDARD.to_vec(),
        },
    });

    catalog
}
