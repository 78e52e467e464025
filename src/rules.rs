// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Balance constants for XP, streaks, goals and leveling.
//!
//! Rules are loaded once at startup and shared read-only with the engines.
//! Swapping a rule set means building a new `GamificationRules`, never
//! mutating one in place.

use crate::models::Tier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Immutable gamification balance table.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GamificationRules {
    /// XP per km for every run.
    #[validate(range(min = 0.0))]
    pub base_xp_per_km: f64,
    /// Extra XP per km when the run counts toward a challenge.
    #[validate(range(min = 0.0))]
    pub challenge_bonus_per_km: f64,
    /// Per-tier XP multiplier. Tiers not listed use the lowest multiplier.
    #[validate(custom(function = "validate_positive_table"))]
    pub tier_multipliers: HashMap<Tier, f64>,
    /// Flat XP added to an activity while a streak is running.
    #[validate(range(min = 0.0))]
    pub streak_bonus: f64,
    /// Per-tier distance goal, used when a challenge has no explicit target.
    #[validate(custom(function = "validate_positive_table"))]
    pub tier_goals_km: HashMap<Tier, f64>,
    /// Goal for tiers missing from `tier_goals_km`.
    #[validate(range(exclusive_min = 0.0))]
    pub default_goal_km: f64,
    /// `K` in `level = floor(sqrt(xp / K)) + 1`.
    #[validate(range(exclusive_min = 0.0))]
    pub level_divisor: f64,
    #[validate(range(min = 1))]
    pub max_level: u32,
    /// XP needed per point of momentum.
    #[validate(range(exclusive_min = 0.0))]
    pub momentum_divisor: f64,
}

impl Default for GamificationRules {
    fn default() -> Self {
        Self {
            base_xp_per_km: 10.0,
            challenge_bonus_per_km: 4.0,
            tier_multipliers: HashMap::from([
                (Tier::Sprint, 1.0),
                (Tier::Marathon, 1.2),
                (Tier::Ultra, 1.4),
                (Tier::Trailblazer, 1.6),
            ]),
            streak_bonus: 10.0,
            tier_goals_km: HashMap::from([
                (Tier::Sprint, 50.0),
                (Tier::Marathon, 100.0),
                (Tier::Ultra, 150.0),
                (Tier::Trailblazer, 200.0),
            ]),
            default_goal_km: 50.0,
            level_divisor: 20.0,
            max_level: 100,
            momentum_divisor: 10.0,
        }
    }
}

impl GamificationRules {
    /// Load rules from a JSON file. Missing fields keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RulesError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| RulesError::Io(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load rules from a JSON string. Missing fields keep their defaults.
    pub fn load_from_json(json_data: &str) -> Result<Self, RulesError> {
        let rules: Self =
            serde_json::from_str(json_data).map_err(|e| RulesError::Parse(e.to_string()))?;
        rules
            .validate()
            .map_err(|e| RulesError::Invalid(e.to_string()))?;
        Ok(rules)
    }

    /// XP per km for a run counted inside a challenge, before the tier multiplier.
    pub fn challenge_rate_per_km(&self) -> f64 {
        self.base_xp_per_km + self.challenge_bonus_per_km
    }

    /// Multiplier for a tier. Unknown tiers get the lowest configured multiplier.
    pub fn tier_multiplier(&self, tier: &Tier) -> f64 {
        self.tier_multipliers
            .get(tier)
            .copied()
            .unwrap_or_else(|| self.lowest_multiplier())
    }

    fn lowest_multiplier(&self) -> f64 {
        self.tier_multipliers
            .values()
            .copied()
            .reduce(f64::min)
            .unwrap_or(1.0)
    }

    /// Distance goal for a tier, falling back to `default_goal_km`.
    pub fn goal_for_tier(&self, tier: &Tier) -> f64 {
        self.tier_goals_km
            .get(tier)
            .copied()
            .unwrap_or(self.default_goal_km)
    }
}

fn validate_positive_table(table: &HashMap<Tier, f64>) -> Result<(), ValidationError> {
    if table.values().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("non_positive_entry"))
    }
}

/// Errors from loading a rules file.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("Failed to read rules file: {0}")]
    Io(String),

    #[error("Failed to parse rules: {0}")]
    Parse(String),

    #[error("Invalid rules: {0}")]
    Invalid(String),
}
