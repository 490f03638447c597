// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User pipeline configuration.

use crate::models::ActivitySource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The enrichment steps a booster kind identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoosterKind {
    UserInput,
    RaceResults,
    LogicGate,
    AutoIncrement,
    WorkoutSummary,
    HeartRateFile,
}

impl BoosterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoosterKind::UserInput => "user_input",
            BoosterKind::RaceResults => "race_results",
            BoosterKind::LogicGate => "logic_gate",
            BoosterKind::AutoIncrement => "auto_increment",
            BoosterKind::WorkoutSummary => "workout_summary",
            BoosterKind::HeartRateFile => "heart_rate_file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user_input" => Some(BoosterKind::UserInput),
            "race_results" => Some(BoosterKind::RaceResults),
            "logic_gate" => Some(BoosterKind::LogicGate),
            "auto_increment" => Some(BoosterKind::AutoIncrement),
            "workout_summary" => Some(BoosterKind::WorkoutSummary),
            "heart_rate_file" => Some(BoosterKind::HeartRateFile),
            _ => None,
        }
    }
}

impl std::fmt::Display for BoosterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured step within a pipeline.
///
/// `inputs` stays a loose string map here; each booster parses it into its
/// own typed config struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoosterConfig {
    pub kind: BoosterKind,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// A failing required step fails the whole run instead of being skipped
    #[serde(default)]
    pub required: bool,
}

/// Where the enriched activity should be uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    /// Destination provider id ("strava", "garmin", ...)
    pub provider: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// A user's enrichment pipeline, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline id (also the document id)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Source this pipeline listens to
    pub source: ActivitySource,
    /// Disabled pipelines are never matched by the dispatcher
    pub enabled: bool,
    /// Ordered enrichment steps
    #[serde(default)]
    pub boosters: Vec<BoosterConfig>,
    /// Upload targets for the enriched result
    #[serde(default)]
    pub destinations: Vec<Destination>,
}
