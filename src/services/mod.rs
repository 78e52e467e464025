// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod awards;
pub mod leveling;
pub mod progress;
pub mod strava;
pub mod streak;
pub mod sync;
pub mod xp;

pub use awards::{AwardEngine, AwardOutcome, EnrolledChallenge};
pub use progress::{BatchOutcome, ProgressEngine};
pub use strava::{ActivityFeed, StravaClient, StravaFeed};
pub use streak::StreakTransition;
pub use sync::{SyncService, SyncSummary};
pub use xp::XpCalculator;
