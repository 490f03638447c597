// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical activity representation shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an activity event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    Strava,
    Garmin,
    Fitbit,
    Parkrun,
    Hevy,
    Manual,
}

impl ActivitySource {
    /// Stable string form used in document ids and pending-input ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivitySource::Strava => "strava",
            ActivitySource::Garmin => "garmin",
            ActivitySource::Fitbit => "fitbit",
            ActivitySource::Parkrun => "parkrun",
            ActivitySource::Hevy => "hevy",
            ActivitySource::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ActivitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-neutral activity produced by ingestion and mutated in place by
/// boosters as it moves through a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizedActivity {
    /// Source system the activity came from
    pub source: ActivitySource,
    /// Activity id in the source system
    #[serde(alias = "externalId")]
    pub external_id: String,
    /// Owning user
    #[serde(alias = "userId")]
    pub user_id: String,
    /// Activity start (UTC)
    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,
    /// Activity title
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Labels attached by the source or by boosters
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ordered sessions (multisport activities have several)
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Loose key/value annotations accumulated by boosters
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl StandardizedActivity {
    /// Total elapsed seconds across all sessions.
    pub fn total_duration_seconds(&self) -> u32 {
        self.sessions.iter().map(|s| s.total_elapsed_seconds).sum()
    }
}

/// One sport block within an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(alias = "totalElapsedSeconds")]
    pub total_elapsed_seconds: u32,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub laps: Vec<Lap>,
    #[serde(default, alias = "strengthSets")]
    pub strength_sets: Vec<StrengthSet>,
}

/// One lap within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lap {
    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(alias = "totalElapsedSeconds")]
    pub total_elapsed_seconds: u32,
    /// Per-second (or sparser) samples, chronologically ordered
    #[serde(default)]
    pub records: Vec<Record>,
}

/// One timestamped sample within a lap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "heartRate")]
    pub heart_rate: Option<u32>,
    #[serde(default)]
    pub power: Option<u32>,
    #[serde(default, alias = "positionLat")]
    pub position_lat: Option<f64>,
    #[serde(default, alias = "positionLong")]
    pub position_long: Option<f64>,
}

/// One strength-training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrengthSet {
    pub exercise: String,
    #[serde(default, alias = "weightKg")]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default, alias = "durationSeconds")]
    pub duration_seconds: Option<u32>,
}

/// One timestamped value from an external sensor stream, before alignment
/// onto an activity timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSample {
    pub timestamp: DateTime<Utc>,
    pub value: u32,
}
