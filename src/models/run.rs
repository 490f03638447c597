// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pipeline run records: the inspectable history of every execution.

use crate::models::ActivitySource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Skipped,
    WaitingForInput,
}

impl RunStatus {
    /// A terminal run is never updated again except by resume.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failed | RunStatus::Skipped
        )
    }
}

/// Outcome of one booster within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
    Waiting,
    Halted,
}

/// Execution record for one booster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoosterExecution {
    /// Booster kind string
    pub booster: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
}

/// Outcome of one destination upload, written by the destination
/// dispatcher after the run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationOutcome {
    pub provider: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// One pipeline execution, keyed by execution id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Execution id (document id)
    pub id: String,
    pub user_id: String,
    pub pipeline_id: String,
    /// Caller-visible activity id the run worked on
    pub activity_id: String,
    pub source: ActivitySource,
    pub source_activity_id: String,
    /// Activity title at run start
    pub title: String,
    pub status: RunStatus,
    /// Human-readable detail for FAILED/SKIPPED/WAITING states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Per-booster outcomes, in execution order
    #[serde(default)]
    pub boosters: Vec<BoosterExecution>,
    #[serde(default)]
    pub destinations: Vec<DestinationOutcome>,
    /// Pristine copy of the triggering payload in object storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_payload_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Named counter scoped to a user, with an execution-id guard so that
/// redelivered executions do not increment twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    /// Counter key (document id), e.g. "parkrun_count"
    pub id: String,
    pub count: u64,
    /// Execution that performed the latest increment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Record of an activity this system itself uploaded to a destination.
/// Consulted by the dispatcher to drop bounceback events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedActivityRecord {
    pub user_id: String,
    pub source: ActivitySource,
    pub external_id: String,
    /// Destination provider the upload went to
    pub destination: String,
    pub uploaded_at: DateTime<Utc>,
}
