// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stride_quest::config::Config;
use stride_quest::db::{FirestoreDb, MemoryStore, ProgressStore, SyncCommit, UserSnapshot};
use stride_quest::error::AppError;
use stride_quest::models::{ChallengeDefinition, ChallengeKind, Enrollment, Tier, UserTokens};
use stride_quest::routes::create_router;
use stride_quest::services::strava::{ActivityFeed, StravaActivitySummary};
use stride_quest::services::{AwardEngine, ProgressEngine, SyncService};
use stride_quest::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Generate a unique user ID for test isolation.
#[allow(dead_code)]
pub fn unique_user_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// Feed serving a list that tests can replace between syncs.
///
/// Honors the `after` cursor the way Strava does (strictly later starts).
#[derive(Default)]
pub struct StaticFeed {
    activities: Mutex<Vec<StravaActivitySummary>>,
}

#[allow(dead_code)]
impl StaticFeed {
    pub fn set(&self, activities: Vec<StravaActivitySummary>) {
        *self.activities.lock().unwrap() = activities;
    }
}

#[async_trait]
impl ActivityFeed for StaticFeed {
    async fn fetch_activities(
        &self,
        _user_id: u64,
        after: DateTime<Utc>,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let activities = self.activities.lock().unwrap().clone();
        Ok(activities
            .into_iter()
            .filter(|a| a.start_date.parse::<DateTime<Utc>>().unwrap() > after)
            .collect())
    }
}

/// Store wrapper whose commits can be made to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_commits: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressStore for FlakyStore {
    async fn load_snapshot(&self, user_id: u64) -> Result<UserSnapshot, AppError> {
        self.inner.load_snapshot(user_id).await
    }

    async fn commit_sync(&self, user_id: u64, commit: &SyncCommit) -> Result<(), AppError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("injected commit failure".to_string()));
        }
        self.inner.commit_sync(user_id, commit).await
    }

    async fn list_challenges(&self) -> Result<Vec<ChallengeDefinition>, AppError> {
        self.inner.list_challenges().await
    }

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<Option<ChallengeDefinition>, AppError> {
        self.inner.get_challenge(challenge_id).await
    }

    async fn upsert_challenge(&self, challenge: &ChallengeDefinition) -> Result<(), AppError> {
        self.inner.upsert_challenge(challenge).await
    }

    async fn enroll(
        &self,
        user_id: u64,
        challenge_id: &str,
    ) -> Result<(Enrollment, bool), AppError> {
        self.inner.enroll(user_id, challenge_id).await
    }

    async fn get_tokens(&self, user_id: u64) -> Result<Option<UserTokens>, AppError> {
        self.inner.get_tokens(user_id).await
    }

    async fn set_tokens(&self, user_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        self.inner.set_tokens(user_id, tokens).await
    }
}

/// Everything a route test needs to drive and inspect the app.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<FlakyStore>,
    pub feed: Arc<StaticFeed>,
}

/// Challenge catalog used by route tests.
#[allow(dead_code)]
pub fn test_catalog() -> Vec<ChallengeDefinition> {
    let mut retired = ChallengeDefinition::new("retired", "Retired Challenge", Tier::Sprint);
    retired.active = false;

    let mut ultra = ChallengeDefinition::new("ultra", "Ultra 150", Tier::Ultra);
    ultra.sport = "trail_running".to_string();

    let mut trailblazer =
        ChallengeDefinition::new("trailblazer", "Trailblazer 200", Tier::Trailblazer);
    trailblazer.kind = ChallengeKind::Public;

    vec![
        ChallengeDefinition::new("sprint", "Sprint 50", Tier::Sprint),
        ChallengeDefinition::new("marathon", "Marathon 100", Tier::Marathon),
        ultra,
        trailblazer,
        retired,
    ]
}

/// Create a test app backed by an in-memory store and a static feed.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::test_default();
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::with_challenges(test_catalog()),
        fail_commits: AtomicBool::new(false),
    });
    let feed = Arc::new(StaticFeed::default());

    let sync = SyncService::new(
        store.clone(),
        feed.clone(),
        ProgressEngine::new(config.rules.clone()),
        AwardEngine::default(),
    );

    let state = Arc::new(AppState {
        config,
        store: store.clone(),
        sync,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        feed,
    }
}

/// Create a test JWT token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Build an authenticated request.
#[allow(dead_code)]
pub fn authed_request(method: &str, uri: &str, user_id: u64, signing_key: &[u8]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(user_id, signing_key)),
        )
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A run starting at 07:00 UTC on `tomorrow + day`.
///
/// Runs are dated after the test's enrollments so they count toward them;
/// a negative `day` gives a run from before joining.
#[allow(dead_code)]
pub fn run(id: u64, day: i64, km: f64) -> StravaActivitySummary {
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    let start = tomorrow.and_hms_opt(7, 0, 0).unwrap().and_utc() + Duration::days(day);
    StravaActivitySummary {
        id,
        name: format!("Run {}", id),
        activity_type: Some("Run".to_string()),
        sport_type: Some("Run".to_string()),
        start_date: start.to_rfc3339(),
        distance: km * 1000.0,
    }
}
