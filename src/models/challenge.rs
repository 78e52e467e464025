// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Challenge catalog model.

use crate::rules::GamificationRules;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Difficulty class of a challenge.
///
/// Stored and serialized as the plain tier name. Names outside the standard
/// four are kept as `Custom` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    Sprint,
    Marathon,
    Ultra,
    Trailblazer,
    Custom(String),
}

impl Tier {
    /// The four tiers shipped with the default catalog.
    pub const STANDARD: [Tier; 4] = [Tier::Sprint, Tier::Marathon, Tier::Ultra, Tier::Trailblazer];

    pub fn as_str(&self) -> &str {
        match self {
            Tier::Sprint => "Sprint",
            Tier::Marathon => "Marathon",
            Tier::Ultra => "Ultra",
            Tier::Trailblazer => "Trailblazer",
            Tier::Custom(name) => name,
        }
    }
}

impl From<&str> for Tier {
    fn from(name: &str) -> Self {
        match name {
            "Sprint" => Tier::Sprint,
            "Marathon" => Tier::Marathon,
            "Ultra" => Tier::Ultra,
            "Trailblazer" => Tier::Trailblazer,
            other => Tier::Custom(other.to_string()),
        }
    }
}

impl From<String> for Tier {
    fn from(name: String) -> Self {
        Tier::from(name.as_str())
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who can take part in a challenge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    #[default]
    Solo,
    Public,
    Club,
}

/// Challenge reference data (read-only to the progress engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeDefinition {
    /// Catalog ID (also used as document ID)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub tier: Tier,
    #[serde(default)]
    pub kind: ChallengeKind,
    #[serde(default = "default_sport")]
    pub sport: String,
    /// Explicit distance goal. When absent the tier goal table applies.
    #[serde(default)]
    pub distance_target_km: Option<f64>,
    /// Activities before this instant do not count (open when absent).
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// Activities after this instant do not count (open when absent).
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_sport() -> String {
    "running".to_string()
}

fn default_active() -> bool {
    true
}

impl ChallengeDefinition {
    /// Minimal open-ended challenge of the given tier.
    pub fn new(id: impl Into<String>, name: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            tier,
            kind: ChallengeKind::Solo,
            sport: default_sport(),
            distance_target_km: None,
            starts_at: None,
            ends_at: None,
            active: true,
        }
    }

    /// Builder-style explicit distance goal.
    pub fn with_target_km(mut self, target_km: f64) -> Self {
        self.distance_target_km = Some(target_km);
        self
    }

    /// Distance needed to complete this challenge.
    pub fn goal_km(&self, rules: &GamificationRules) -> f64 {
        match self.distance_target_km {
            Some(target) if target.is_finite() && target > 0.0 => target,
            _ => rules.goal_for_tier(&self.tier),
        }
    }

    /// Whether an activity at `at` falls inside the challenge window.
    pub fn accepts(&self, at: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|start| at >= start) && self.ends_at.is_none_or(|end| at <= end)
    }
}
