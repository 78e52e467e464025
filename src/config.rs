//! Application configuration loaded from environment variables.
//!
//! Secrets arrive as environment variables (injected by the platform's
//! secret bindings) and are read once at startup.

use crate::rules::{GamificationRules, RulesError};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// Where progress data is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    /// Process-local store; data is lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StorageBackend::Firestore),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// Strava API base URL (overridable for local fakes)
    pub strava_api_url: String,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    /// Balance table shared by the engines
    pub rules: Arc<GamificationRules>,
}

const DEFAULT_STRAVA_API_URL: &str = "https://www.strava.com/api/v3";

impl Config {
    /// Config for tests: in-memory storage and a fixed signing key.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            strava_api_url: DEFAULT_STRAVA_API_URL.to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            rules: Arc::new(GamificationRules::default()),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// If `GAMIFICATION_RULES_PATH` is set, the rule set is read from that
    /// JSON file; otherwise the built-in rules apply.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let rules = match env::var("GAMIFICATION_RULES_PATH") {
            Ok(path) => {
                let rules = GamificationRules::load_from_file(&path)?;
                tracing::info!(path = %path, "Loaded gamification rules");
                rules
            }
            Err(_) => GamificationRules::default(),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_API_URL.to_string()),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),

            rules: Arc::new(rules),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Rules(#[from] RulesError),
}
