// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending input records for paused pipeline executions.

use crate::models::ActivitySource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a pending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputStatus {
    Waiting,
    Completed,
    Dismissed,
}

/// A paused execution waiting for data before it can resume.
///
/// The document id is the stable `source:externalId:boosterId` triple, so
/// a redelivered pause upserts the same record instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInput {
    /// Stable id: `source:externalId:boosterId`
    pub id: String,
    pub user_id: String,
    pub status: InputStatus,
    /// Booster kind that requested the pause
    pub booster_id: String,
    /// Field names the booster needs filled in
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Caller-visible activity id to resume against
    pub linked_activity_id: String,
    pub source: ActivitySource,
    pub external_id: String,
    pub pipeline_id: String,
    /// Execution that paused on this input
    pub execution_id: String,
    /// Full original payload, offloaded to object storage
    pub original_payload_uri: String,
    /// Field values supplied on resolution
    #[serde(default)]
    pub input_data: BTreeMap<String, String>,
    /// True when a scheduled poller can fill this in without a human
    #[serde(default)]
    pub auto_populated: bool,
    /// Display hints for the UI (labels, descriptions)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
