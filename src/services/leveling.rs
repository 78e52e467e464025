// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP to level mapping.
//!
//! `level = floor(sqrt(xp / K)) + 1`, clamped to `[1, max_level]`. Level `L`
//! starts at `(L - 1)^2 * K` XP, so the next level starts at `L^2 * K`.

use crate::models::UserAggregate;
use crate::rules::GamificationRules;

/// Level for an XP total. Negative or NaN XP counts as zero.
pub fn level_for(xp: f64, rules: &GamificationRules) -> u32 {
    if xp.is_nan() || xp <= 0.0 {
        return 1;
    }
    let raw = (xp / rules.level_divisor).sqrt().floor() + 1.0;
    if raw >= rules.max_level as f64 {
        rules.max_level
    } else {
        raw as u32
    }
}

/// XP at which `level + 1` begins, or `None` at the level cap.
pub fn xp_for_next_level(level: u32, rules: &GamificationRules) -> Option<f64> {
    if level >= rules.max_level {
        return None;
    }
    let level = f64::from(level.max(1));
    Some(level * level * rules.level_divisor)
}

pub fn is_at_max_level(aggregate: &UserAggregate, rules: &GamificationRules) -> bool {
    aggregate.level >= rules.max_level
}

/// Recompute the cached level from XP.
///
/// Only raises the level, and only below the cap. Returns `true` on level-up.
pub fn check_level_up(aggregate: &mut UserAggregate, rules: &GamificationRules) -> bool {
    let new_level = level_for(aggregate.xp, rules);
    if new_level > aggregate.level && aggregate.level < rules.max_level {
        tracing::info!(
            from = aggregate.level,
            to = new_level,
            xp = aggregate.xp,
            "Level up"
        );
        aggregate.level = new_level;
        return true;
    }
    false
}
