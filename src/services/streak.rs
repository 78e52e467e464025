// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Consecutive-day streak tracking per enrollment.
//!
//! Callers must feed one enrollment's activities in ascending chronological
//! order. Out-of-order input is treated as a backdated activity and resets
//! the streak.

use crate::models::Enrollment;
use chrono::{DateTime, Utc};

/// What an activity did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// First activity for this enrollment
    Started,
    /// Activity on the day after the previous one
    Extended,
    /// Another activity on the same calendar day
    SameDay,
    /// Gap of more than one day, or a backdated activity
    Reset,
}

/// Apply an activity at `activity_at` to the enrollment's streak.
///
/// Streaks compare UTC calendar dates, not instants. `last_progress_at` is
/// only moved forward.
pub fn apply_streak(enrollment: &mut Enrollment, activity_at: DateTime<Utc>) -> StreakTransition {
    let today = activity_at.date_naive();

    let transition = match enrollment.last_progress_at.map(|last| last.date_naive()) {
        None => StreakTransition::Started,
        Some(last_date) if today == last_date => StreakTransition::SameDay,
        Some(last_date) if last_date.succ_opt() == Some(today) => StreakTransition::Extended,
        Some(_) => StreakTransition::Reset,
    };

    match transition {
        StreakTransition::Started | StreakTransition::Reset => enrollment.streak_days = 1,
        StreakTransition::Extended => {
            enrollment.streak_days = enrollment.streak_days.saturating_add(1)
        }
        // A same-day repeat after a zeroed record still counts as day one.
        StreakTransition::SameDay => enrollment.streak_days = enrollment.streak_days.max(1),
    }

    if enrollment
        .last_progress_at
        .is_none_or(|last| activity_at > last)
    {
        enrollment.last_progress_at = Some(activity_at);
    }

    transition
}
