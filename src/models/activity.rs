// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Validated activity record handed to the progress engine.

use crate::error::AppError;
use crate::services::strava::StravaActivitySummary;
use chrono::{DateTime, NaiveDate, Utc};

/// Activity type. Only runs count toward progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    Run,
    Other(String),
}

impl From<&str> for ActivityType {
    fn from(name: &str) -> Self {
        match name {
            "Run" => ActivityType::Run,
            other => ActivityType::Other(other.to_string()),
        }
    }
}

/// An activity as seen by the progress engine.
///
/// Built from a Strava summary at the feed boundary; records that fail
/// validation never reach the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    /// Strava activity ID
    pub id: u64,
    pub name: String,
    pub activity_type: ActivityType,
    /// Distance in kilometers (>= 0)
    pub distance_km: f64,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// Convenience constructor for a run.
    pub fn run(id: u64, distance_km: f64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: format!("Run {}", id),
            activity_type: ActivityType::Run,
            distance_km,
            occurred_at,
        }
    }

    pub fn is_run(&self) -> bool {
        self.activity_type == ActivityType::Run
    }

    /// Calendar date (UTC) used for streak tracking.
    pub fn activity_date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }
}

impl TryFrom<StravaActivitySummary> for ActivityRecord {
    type Error = AppError;

    fn try_from(summary: StravaActivitySummary) -> Result<Self, Self::Error> {
        if !summary.distance.is_finite() || summary.distance < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "Activity {} has invalid distance {}",
                summary.id, summary.distance
            )));
        }

        let occurred_at = DateTime::parse_from_rfc3339(&summary.start_date)
            .map_err(|e| {
                AppError::InvalidInput(format!(
                    "Activity {} has invalid start_date {:?}: {}",
                    summary.id, summary.start_date, e
                ))
            })?
            .with_timezone(&Utc);

        let activity_type = summary
            .activity_type
            .as_deref()
            .or(summary.sport_type.as_deref())
            .map(ActivityType::from)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Activity {} has no type", summary.id))
            })?;

        Ok(Self {
            id: summary.id,
            name: summary.name,
            activity_type,
            distance_km: summary.distance / 1000.0,
            occurred_at,
        })
    }
}
