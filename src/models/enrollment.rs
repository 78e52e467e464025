// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! A user's participation record in one challenge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user challenge progress.
///
/// Only the progress engine mutates the progress fields. Distance, XP and
/// `completed` never move backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: u64,
    pub challenge_id: String,
    #[serde(default)]
    pub distance_completed_km: f64,
    /// Consecutive calendar days with a qualifying activity
    #[serde(default)]
    pub streak_days: u32,
    #[serde(default)]
    pub xp_earned: f64,
    #[serde(default)]
    pub completed: bool,
    /// Latest activity instant applied to this enrollment
    #[serde(default)]
    pub last_progress_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn new(user_id: u64, challenge_id: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            challenge_id: challenge_id.into(),
            distance_completed_km: 0.0,
            streak_days: 0,
            xp_earned: 0.0,
            completed: false,
            last_progress_at: None,
            joined_at,
            updated_at: None,
        }
    }

    /// Document ID for this enrollment.
    pub fn document_id(&self) -> String {
        document_id(self.user_id, &self.challenge_id)
    }
}

/// Document ID for a (user, challenge) pair.
pub fn document_id(user_id: u64, challenge_id: &str) -> String {
    format!("{}_{}", user_id, urlencoding::encode(challenge_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_escapes_challenge_id() {
        assert_eq!(document_id(7, "sprint-2026"), "7_sprint-2026");
        assert_eq!(document_id(7, "club/run"), "7_club%2Frun");
    }

    #[test]
    fn test_deserializes_with_missing_progress_fields() {
        let json = r#"{"user_id": 1, "challenge_id": "c1", "joined_at": "2026-01-01T00:00:00Z"}"#;
        let enrollment: Enrollment = serde_json::from_str(json).unwrap();
        assert_eq!(enrollment.streak_days, 0);
        assert!(!enrollment.completed);
        assert!(enrollment.last_progress_at.is_none());
    }
}
