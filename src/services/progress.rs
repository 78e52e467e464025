// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge progress engine.
//!
//! Handles the per-sync workflow:
//! 1. Filter the fetched activities to new, valid runs
//! 2. Sort them chronologically
//! 3. Apply each run to every active enrollment whose window accepts it,
//!    counting only runs from after the user joined
//! 4. Credit free-run XP for runs outside every challenge
//! 5. Roll the batch total into the user's XP, momentum and level

use crate::error::{AppError, Result};
use crate::models::{ActivityRecord, ChallengeDefinition, Enrollment, UserAggregate};
use crate::rules::GamificationRules;
use crate::services::leveling::check_level_up;
use crate::services::streak::apply_streak;
use crate::services::xp::XpCalculator;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Applies activities to enrollments and the user aggregate.
#[derive(Debug, Clone)]
pub struct ProgressEngine {
    rules: Arc<GamificationRules>,
    xp: XpCalculator,
}

/// Result of applying one sync batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// New runs applied in this batch
    pub activities_processed: usize,
    /// Activities dropped as invalid or already processed
    pub activities_skipped: usize,
    pub xp_added: f64,
    /// Challenge IDs whose enrollment earned XP
    pub challenges_updated: Vec<String>,
    /// Challenge IDs whose enrollment completed in this batch
    pub challenges_completed: Vec<String>,
    pub leveled_up: bool,
}

impl ProgressEngine {
    pub fn new(rules: Arc<GamificationRules>) -> Self {
        Self {
            xp: XpCalculator::new(rules.clone()),
            rules,
        }
    }

    /// Apply one activity to one enrollment and return the XP it earned.
    ///
    /// Rejects non-positive distances with `InvalidInput` before touching
    /// any state. Completion is one-way.
    pub fn update_progress(
        &self,
        enrollment: &mut Enrollment,
        challenge: &ChallengeDefinition,
        distance_km: f64,
        activity_at: DateTime<Utc>,
    ) -> Result<f64> {
        if !distance_km.is_finite() || distance_km <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "distance must be positive, got {} km",
                distance_km
            )));
        }

        let transition = apply_streak(enrollment, activity_at);
        let xp = self
            .xp
            .challenge_xp(distance_km, &challenge.tier, enrollment.streak_days)?;

        enrollment.distance_completed_km += distance_km;
        enrollment.xp_earned += xp;

        tracing::debug!(
            user_id = enrollment.user_id,
            challenge_id = %enrollment.challenge_id,
            distance_km,
            xp,
            streak_days = enrollment.streak_days,
            ?transition,
            "Progress updated"
        );

        let goal_km = challenge.goal_km(&self.rules);
        if !enrollment.completed && enrollment.distance_completed_km >= goal_km {
            enrollment.completed = true;
            tracing::info!(
                user_id = enrollment.user_id,
                challenge_id = %enrollment.challenge_id,
                goal_km,
                "Challenge completed"
            );
        }

        Ok(xp)
    }

    /// Apply a batch of fetched activities for one user.
    ///
    /// `activities` may be unordered and may include non-runs and activities
    /// from earlier syncs; both are filtered here. Enrollments whose
    /// challenge is missing from `challenges` or inactive are left untouched.
    pub fn apply_batch(
        &self,
        aggregate: &mut UserAggregate,
        enrollments: &mut [Enrollment],
        challenges: &HashMap<String, ChallengeDefinition>,
        activities: &[ActivityRecord],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for activity in activities {
            aggregate.advance_watermark(activity.occurred_at);
        }

        let mut seen = HashSet::new();
        let mut runs: Vec<&ActivityRecord> = Vec::new();
        for activity in activities.iter().filter(|a| a.is_run()) {
            if aggregate.has_processed(activity.id) || !seen.insert(activity.id) {
                outcome.activities_skipped += 1;
                continue;
            }
            if !activity.distance_km.is_finite() || activity.distance_km <= 0.0 {
                tracing::warn!(
                    activity_id = activity.id,
                    distance_km = activity.distance_km,
                    "Skipping run with non-positive distance"
                );
                outcome.activities_skipped += 1;
                continue;
            }
            runs.push(activity);
        }
        runs.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));

        let mut counted = vec![false; runs.len()];

        for enrollment in enrollments.iter_mut() {
            let Some(challenge) = challenges.get(&enrollment.challenge_id) else {
                tracing::warn!(
                    user_id = enrollment.user_id,
                    challenge_id = %enrollment.challenge_id,
                    "Enrollment references unknown challenge, skipping"
                );
                continue;
            };
            if !challenge.active {
                continue;
            }

            let was_completed = enrollment.completed;
            let mut enrollment_xp = 0.0;

            for (run, counted) in runs.iter().zip(counted.iter_mut()) {
                if run.occurred_at < enrollment.joined_at || !challenge.accepts(run.occurred_at) {
                    continue;
                }
                match self.update_progress(enrollment, challenge, run.distance_km, run.occurred_at)
                {
                    Ok(xp) => {
                        enrollment_xp += xp;
                        *counted = true;
                    }
                    Err(e) => {
                        tracing::warn!(
                            activity_id = run.id,
                            challenge_id = %challenge.id,
                            error = %e,
                            "Skipping activity"
                        );
                    }
                }
            }

            if enrollment_xp > 0.0 {
                outcome.challenges_updated.push(enrollment.challenge_id.clone());
            }
            if enrollment.completed && !was_completed {
                outcome
                    .challenges_completed
                    .push(enrollment.challenge_id.clone());
            }
            outcome.xp_added += enrollment_xp;
        }

        for (run, counted) in runs.iter().zip(&counted) {
            aggregate.record_run(run);
            if *counted {
                continue;
            }
            match self.xp.free_run_xp(run.distance_km) {
                Ok(xp) => outcome.xp_added += xp,
                Err(e) => tracing::warn!(activity_id = run.id, error = %e, "Skipping activity"),
            }
        }
        outcome.activities_processed = runs.len();

        aggregate.xp += outcome.xp_added;
        aggregate.momentum += (outcome.xp_added / self.rules.momentum_divisor).floor() as u64;
        outcome.leveled_up = check_level_up(aggregate, &self.rules);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityType, Tier};
    use chrono::TimeZone;

    fn engine() -> ProgressEngine {
        ProgressEngine::new(Arc::new(GamificationRules::default()))
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, d, 7, 30, 0).unwrap()
    }

    fn sprint() -> ChallengeDefinition {
        ChallengeDefinition::new("sprint", "Sprint Challenge", Tier::Sprint).with_target_km(50.0)
    }

    fn challenges(defs: Vec<ChallengeDefinition>) -> HashMap<String, ChallengeDefinition> {
        defs.into_iter().map(|c| (c.id.clone(), c)).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_sprint_scenario() {
        let engine = engine();
        let challenge = sprint();
        let mut enrollment = Enrollment::new(1, "sprint", day(1));

        let mut total_xp = 0.0;
        for (d, km) in [(1, 5.0), (2, 7.0), (3, 12.0)] {
            total_xp += engine
                .update_progress(&mut enrollment, &challenge, km, day(d))
                .unwrap();
        }

        assert_close(enrollment.distance_completed_km, 24.0);
        assert_eq!(enrollment.streak_days, 3);
        assert!(!enrollment.completed);
        // (5 + 7 + 12) * 14 + 3 * 10
        assert_close(total_xp, 366.0);

        let xp = engine
            .update_progress(&mut enrollment, &challenge, 26.0, day(4))
            .unwrap();
        assert_close(xp, 374.0);
        assert_close(enrollment.distance_completed_km, 50.0);
        assert_eq!(enrollment.streak_days, 4);
        assert!(enrollment.completed);
        assert_eq!(enrollment.last_progress_at, Some(day(4)));
    }

    #[test]
    fn test_completion_threshold_is_inclusive() {
        let engine = engine();
        let challenge = sprint();

        let mut exact = Enrollment::new(1, "sprint", day(1));
        engine.update_progress(&mut exact, &challenge, 25.0, day(1)).unwrap();
        engine.update_progress(&mut exact, &challenge, 25.0, day(2)).unwrap();
        assert!(exact.completed);

        let mut short = Enrollment::new(1, "sprint", day(1));
        engine.update_progress(&mut short, &challenge, 20.0, day(1)).unwrap();
        engine.update_progress(&mut short, &challenge, 29.99, day(2)).unwrap();
        assert!(!short.completed);
    }

    #[test]
    fn test_completion_is_one_way() {
        let engine = engine();
        let challenge = sprint();
        let mut enrollment = Enrollment::new(1, "sprint", day(1));
        engine
            .update_progress(&mut enrollment, &challenge, 60.0, day(1))
            .unwrap();
        assert!(enrollment.completed);

        engine
            .update_progress(&mut enrollment, &challenge, 1.0, day(9))
            .unwrap();
        assert!(enrollment.completed);
        assert_eq!(enrollment.streak_days, 1);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let engine = engine();
        let challenge = sprint();
        let mut enrollment = Enrollment::new(1, "sprint", day(1));
        let mut last_distance = 0.0;
        let mut last_xp = 0.0;

        for (d, km) in [(1, 3.0), (1, 2.0), (3, 0.5), (2, 4.0), (10, 8.0)] {
            engine
                .update_progress(&mut enrollment, &challenge, km, day(d))
                .unwrap();
            assert!(enrollment.distance_completed_km >= last_distance);
            assert!(enrollment.xp_earned >= last_xp);
            last_distance = enrollment.distance_completed_km;
            last_xp = enrollment.xp_earned;
        }
    }

    #[test]
    fn test_rejects_zero_distance_without_mutation() {
        let engine = engine();
        let challenge = sprint();
        let mut enrollment = Enrollment::new(1, "sprint", day(1));
        let before = enrollment.clone();

        let err = engine
            .update_progress(&mut enrollment, &challenge, 0.0, day(1))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(enrollment, before);
    }

    #[test]
    fn test_unknown_tier_uses_default_goal() {
        let engine = engine();
        let challenge = ChallengeDefinition::new("odd", "Odd", Tier::Custom("Zigzag".into()));
        let mut enrollment = Enrollment::new(1, "odd", day(1));
        engine
            .update_progress(&mut enrollment, &challenge, 50.0, day(1))
            .unwrap();
        assert!(enrollment.completed);
    }

    #[test]
    fn test_batch_sorts_filters_and_totals() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments = vec![Enrollment::new(1, "sprint", day(1))];
        let catalog = challenges(vec![sprint()]);

        let mut ride = ActivityRecord::run(99, 40.0, day(2));
        ride.activity_type = ActivityType::Other("Ride".to_string());

        // Deliberately out of order
        let activities = vec![
            ActivityRecord::run(3, 12.0, day(3)),
            ride,
            ActivityRecord::run(1, 5.0, day(1)),
            ActivityRecord::run(2, 7.0, day(2)),
        ];

        let outcome = engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);

        assert_eq!(outcome.activities_processed, 3);
        assert_close(outcome.xp_added, 366.0);
        assert_eq!(outcome.challenges_updated, vec!["sprint".to_string()]);
        assert!(outcome.challenges_completed.is_empty());
        assert_eq!(enrollments[0].streak_days, 3);
        assert_close(enrollments[0].distance_completed_km, 24.0);

        assert_close(aggregate.xp, 366.0);
        assert_eq!(aggregate.momentum, 36);
        assert_close(aggregate.total_distance_km, 24.0);
        assert_eq!(aggregate.level, 5);
        assert!(outcome.leveled_up);
        assert_eq!(aggregate.last_sync_at, Some(day(3)));
    }

    #[test]
    fn test_batch_skips_already_processed_runs() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments = vec![Enrollment::new(1, "sprint", day(1))];
        let catalog = challenges(vec![sprint()]);
        let activities = vec![ActivityRecord::run(1, 5.0, day(1))];

        engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);
        let snapshot = (aggregate.clone(), enrollments.clone());

        let outcome = engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);
        assert_eq!(outcome.activities_processed, 0);
        assert_eq!(outcome.activities_skipped, 1);
        assert_eq!(outcome.xp_added, 0.0);
        assert!(outcome.challenges_updated.is_empty());
        assert_eq!((aggregate, enrollments), snapshot);
    }

    #[test]
    fn test_batch_applies_each_run_to_every_enrollment() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments = vec![
            Enrollment::new(1, "sprint", day(1)),
            Enrollment::new(1, "ultra", day(1)),
        ];
        let catalog = challenges(vec![
            sprint(),
            ChallengeDefinition::new("ultra", "Ultra Challenge", Tier::Ultra),
        ]);
        let activities = vec![ActivityRecord::run(1, 10.0, day(1))];

        let outcome = engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);

        // Sprint: 10 * 14 * 1.0 + 10, Ultra: 10 * 14 * 1.4 + 10
        assert_close(outcome.xp_added, 150.0 + 206.0);
        assert_eq!(outcome.challenges_updated.len(), 2);
        // Lifetime distance counts the run once
        assert_close(aggregate.total_distance_km, 10.0);
        assert_eq!(aggregate.total_runs, 1);
    }

    #[test]
    fn test_batch_free_run_xp_outside_challenges() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments: Vec<Enrollment> = Vec::new();
        let activities = vec![ActivityRecord::run(1, 4.0, day(1))];

        let outcome =
            engine.apply_batch(&mut aggregate, &mut enrollments, &HashMap::new(), &activities);
        assert_close(outcome.xp_added, 40.0);
        assert_eq!(aggregate.momentum, 4);
    }

    #[test]
    fn test_batch_ignores_inactive_and_out_of_window_challenges() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();

        let mut closed = ChallengeDefinition::new("closed", "Closed", Tier::Marathon);
        closed.active = false;
        let mut later = ChallengeDefinition::new("later", "Later", Tier::Ultra);
        later.starts_at = Some(day(10));

        let mut enrollments = vec![
            Enrollment::new(1, "closed", day(1)),
            Enrollment::new(1, "later", day(1)),
            Enrollment::new(1, "missing", day(1)),
        ];
        let catalog = challenges(vec![closed, later]);
        let activities = vec![ActivityRecord::run(1, 3.0, day(2))];

        let outcome = engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);

        assert!(outcome.challenges_updated.is_empty());
        assert!(enrollments.iter().all(|e| e.distance_completed_km == 0.0));
        // Counted toward no challenge, so it earns free-run XP
        assert_close(outcome.xp_added, 30.0);
    }

    #[test]
    fn test_batch_ignores_runs_before_joining() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments = vec![Enrollment::new(1, "sprint", day(5))];
        let catalog = challenges(vec![sprint()]);
        let activities = vec![
            ActivityRecord::run(1, 60.0, day(2)),
            ActivityRecord::run(2, 5.0, day(6)),
        ];

        let outcome = engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);

        assert_close(enrollments[0].distance_completed_km, 5.0);
        assert_eq!(enrollments[0].streak_days, 1);
        assert!(!enrollments[0].completed);
        assert!(outcome.challenges_completed.is_empty());
        // The early run still counts as a free run: 60 * 10 + (5 * 14 + 10)
        assert_close(outcome.xp_added, 680.0);
        assert_close(aggregate.total_distance_km, 65.0);
    }

    #[test]
    fn test_batch_skips_zero_distance_runs() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments = vec![Enrollment::new(1, "sprint", day(1))];
        let catalog = challenges(vec![sprint()]);
        let activities = vec![
            ActivityRecord::run(1, 0.0, day(1)),
            ActivityRecord::run(2, 5.0, day(2)),
        ];

        let outcome = engine.apply_batch(&mut aggregate, &mut enrollments, &catalog, &activities);
        assert_eq!(outcome.activities_processed, 1);
        assert_eq!(outcome.activities_skipped, 1);
        assert_eq!(enrollments[0].streak_days, 1);
        assert!(!aggregate.has_processed(1));
    }

    #[test]
    fn test_batch_reports_completion_once() {
        let engine = engine();
        let mut aggregate = UserAggregate::default();
        let mut enrollments = vec![Enrollment::new(1, "sprint", day(1))];
        let catalog = challenges(vec![sprint()]);

        let first = engine.apply_batch(
            &mut aggregate,
            &mut enrollments,
            &catalog,
            &[ActivityRecord::run(1, 55.0, day(1))],
        );
        assert_eq!(first.challenges_completed, vec!["sprint".to_string()]);

        let second = engine.apply_batch(
            &mut aggregate,
            &mut enrollments,
            &catalog,
            &[ActivityRecord::run(2, 5.0, day(2))],
        );
        assert!(second.challenges_completed.is_empty());
        assert!(enrollments[0].completed);
    }
}
