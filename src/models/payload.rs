// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Queue envelopes: the raw/pipeline activity payload and the enriched
//! event handed to destination dispatch.
//!
//! Payloads are written by several producers, not all of which agree on
//! casing, so every field carries a camelCase alias.

use crate::models::{ActivitySource, StandardizedActivity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope carried on the raw-activity and pipeline-activity queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// Owning user
    #[serde(alias = "userId")]
    pub user_id: String,
    /// Source system
    pub source: ActivitySource,
    /// Activity id in the source system
    #[serde(alias = "externalId")]
    pub external_id: String,
    /// Target pipeline. Unset on the raw queue; the dispatcher assigns it.
    #[serde(default, alias = "pipelineId")]
    pub pipeline_id: Option<String>,
    /// Execution id, unique per (event, pipeline)
    #[serde(default, alias = "pipelineExecutionId")]
    pub pipeline_execution_id: Option<String>,
    /// Inline activity body
    #[serde(default)]
    pub activity: Option<StandardizedActivity>,
    /// Reference to an offloaded activity body in object storage
    #[serde(default, alias = "payloadUri")]
    pub payload_uri: Option<String>,
    /// Set when this delivery resumes a paused execution
    #[serde(default, alias = "isResume")]
    pub is_resume: bool,
    /// Boosters allowed to run in resume mode
    #[serde(default, alias = "resumeOnlyBoosters")]
    pub resume_only_boosters: Vec<String>,
    /// Pending input that triggered the resume
    #[serde(default, alias = "resumePendingInputId")]
    pub resume_pending_input_id: Option<String>,
    /// Caller-visible activity id a paused execution was linked to
    #[serde(default, alias = "activityId")]
    pub activity_id: Option<String>,
}

impl ActivityPayload {
    /// Execution id for a fan-out clone: base id suffixed with the
    /// pipeline id, so each clone is traceable to both.
    pub fn derive_execution_id(base_id: &str, pipeline_id: &str) -> String {
        format!("{}-{}", base_id, pipeline_id)
    }
}

/// Event published to the enriched-activity queue after a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedActivityEvent {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "pipelineId")]
    pub pipeline_id: String,
    #[serde(alias = "pipelineExecutionId")]
    pub pipeline_execution_id: String,
    /// Fully merged activity
    pub activity: StandardizedActivity,
    /// Booster kinds that completed, in execution order
    #[serde(default, alias = "appliedBoosters")]
    pub applied_boosters: Vec<String>,
    /// Merged booster metadata (later boosters win on key conflicts)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Destinations configured on the pipeline
    #[serde(default)]
    pub destinations: Vec<crate::models::Destination>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_execution_id_joins_with_hyphen() {
        assert_eq!(
            ActivityPayload::derive_execution_id("exec-123", "pipe-a"),
            "exec-123-pipe-a"
        );
    }

    #[test]
    fn payload_accepts_camel_case() {
        let payload: ActivityPayload = serde_json::from_value(serde_json::json!({
            "userId": "u1",
            "source": "strava",
            "externalId": "987",
            "pipelineId": "pipe-a",
            "isResume": true,
            "resumeOnlyBoosters": ["race_results"],
        }))
        .unwrap();

        assert_eq!(payload.user_id, "u1");
        assert_eq!(payload.external_id, "987");
        assert_eq!(payload.pipeline_id.as_deref(), Some("pipe-a"));
        assert!(payload.is_resume);
        assert_eq!(payload.resume_only_boosters, vec!["race_results"]);
    }

    #[test]
    fn payload_accepts_snake_case() {
        let payload: ActivityPayload = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "source": "garmin",
            "external_id": "42",
        }))
        .unwrap();

        assert_eq!(payload.source, ActivitySource::Garmin);
        assert!(payload.pipeline_id.is_none());
        assert!(!payload.is_resume);
    }
}
