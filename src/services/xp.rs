// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP awarded for a single activity.
//!
//! Inside a challenge:
//! `xp = distance_km * (base + challenge_bonus) * tier_multiplier + streak_bonus`
//! where the flat streak bonus applies whenever the post-update streak is
//! non-zero. It does not scale with streak length.

use crate::error::{AppError, Result};
use crate::models::Tier;
use crate::rules::GamificationRules;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct XpCalculator {
    rules: Arc<GamificationRules>,
}

impl XpCalculator {
    pub fn new(rules: Arc<GamificationRules>) -> Self {
        Self { rules }
    }

    /// XP for a run counted toward a challenge of `tier`.
    ///
    /// `current_streak_days` is the enrollment's streak after this activity
    /// was applied to it.
    pub fn challenge_xp(&self, distance_km: f64, tier: &Tier, current_streak_days: u32) -> Result<f64> {
        check_distance(distance_km)?;

        let mut xp =
            distance_km * self.rules.challenge_rate_per_km() * self.rules.tier_multiplier(tier);
        if current_streak_days > 0 {
            xp += self.rules.streak_bonus;
        }
        Ok(xp)
    }

    /// XP for a run that counted toward no challenge.
    pub fn free_run_xp(&self, distance_km: f64) -> Result<f64> {
        check_distance(distance_km)?;
        Ok(distance_km * self.rules.base_xp_per_km)
    }
}

fn check_distance(distance_km: f64) -> Result<()> {
    if distance_km.is_finite() && distance_km > 0.0 {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "distance must be positive, got {} km",
            distance_km
        )))
    }
}
