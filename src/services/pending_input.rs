// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending-input lifecycle: pause, resolve, dismiss, and the scheduled
//! poll that auto-populates inputs from external sources.
//!
//! Resolution republishes the stored original payload to the
//! pipeline-activity queue with resume flags set, so the orchestrator is
//! the single entry point for both fresh and resumed executions.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    ActivityPayload, ActivitySource, InputStatus, PendingInput, RunStatus, StandardizedActivity,
    User,
};
use crate::services::boosters::{BoosterRegistry, InputRequest};
use crate::services::storage::BlobStore;
use crate::services::tasks::Publisher;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stable pending-input id: `source:externalId:boosterId`.
///
/// Deterministic so a redelivered pause upserts instead of duplicating.
pub fn generate_id(source: ActivitySource, external_id: &str, booster_id: &str) -> String {
    format!("{}:{}:{}", source.as_str(), external_id, booster_id)
}

/// Components of a parsed pending-input id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInputId {
    pub source: String,
    pub external_id: String,
    pub booster_id: String,
}

/// Split a pending-input id back into its three components.
///
/// Only the first two colons delimit; the trailing component keeps any
/// further colons. Ids with fewer than two colons are rejected.
pub fn parse_id(id: &str) -> Result<ParsedInputId> {
    let mut parts = id.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(source), Some(external_id), Some(booster_id))
            if !source.is_empty() && !external_id.is_empty() && !booster_id.is_empty() =>
        {
            Ok(ParsedInputId {
                source: source.to_string(),
                external_id: external_id.to_string(),
                booster_id: booster_id.to_string(),
            })
        }
        _ => Err(AppError::BadRequest(format!(
            "Malformed pending input id: {}",
            id
        ))),
    }
}

/// Outcome of one scheduled poll sweep.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    pub checked: u32,
    pub resolved: u32,
}

/// Pause/resolve/dismiss operations over pending inputs.
pub struct PendingInputService {
    db: Arc<dyn Database>,
    storage: Arc<dyn BlobStore>,
    publisher: Arc<dyn Publisher>,
    registry: Arc<BoosterRegistry>,
}

impl PendingInputService {
    pub fn new(
        db: Arc<dyn Database>,
        storage: Arc<dyn BlobStore>,
        publisher: Arc<dyn Publisher>,
        registry: Arc<BoosterRegistry>,
    ) -> Self {
        Self {
            db,
            storage,
            publisher,
            registry,
        }
    }

    /// Persist a paused execution: offload the original payload and upsert
    /// the WAITING record. An already-completed input is never overwritten;
    /// the stored record comes back so the caller can see the data arrived.
    pub async fn pause(
        &self,
        payload: &ActivityPayload,
        activity: &StandardizedActivity,
        booster_id: &str,
        execution_id: &str,
        request: InputRequest,
    ) -> Result<PendingInput> {
        let id = generate_id(activity.source, &activity.external_id, booster_id);

        let existing = self.db.get_pending_input(&id).await?;
        if let Some(existing) = existing {
            if existing.status == InputStatus::Completed {
                tracing::info!(pending_input_id = %id, "Input already completed, not overwriting");
                return Ok(existing);
            }
        }

        let path = format!("payloads/{}/{}.json", activity.user_id, id);
        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Payload serialize error: {}", e)))?;
        let uri = self.storage.write(&path, body).await?;

        let now = Utc::now();
        let input = PendingInput {
            id: id.clone(),
            user_id: activity.user_id.clone(),
            status: InputStatus::Waiting,
            booster_id: booster_id.to_string(),
            required_fields: request.required_fields,
            linked_activity_id: payload
                .activity_id
                .clone()
                .unwrap_or_else(|| activity.external_id.clone()),
            source: activity.source,
            external_id: activity.external_id.clone(),
            pipeline_id: payload.pipeline_id.clone().unwrap_or_default(),
            execution_id: execution_id.to_string(),
            original_payload_uri: uri,
            input_data: BTreeMap::new(),
            auto_populated: request.auto_populated,
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.db.upsert_pending_input(&input).await?;
        tracing::info!(
            pending_input_id = %id,
            booster = booster_id,
            auto_populated = input.auto_populated,
            "Execution paused on pending input"
        );
        Ok(input)
    }

    /// Resolve a pending input on behalf of `actor` (human path).
    ///
    /// Only the owner or an admin may resolve; anyone else gets Forbidden
    /// with no state touched.
    pub async fn resolve(
        &self,
        actor: &User,
        id: &str,
        input_data: BTreeMap<String, String>,
    ) -> Result<PendingInput> {
        let input = self
            .db
            .get_pending_input(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pending input {}", id)))?;

        if input.user_id != actor.user_id && !actor.admin {
            return Err(AppError::Forbidden(
                "Pending input belongs to another user".to_string(),
            ));
        }

        if input.status != InputStatus::Waiting {
            return Err(AppError::BadRequest(format!(
                "Pending input {} is not waiting",
                id
            )));
        }

        self.complete_and_republish(input, input_data).await
    }

    /// Dismiss a pending input. Missing inputs are a no-op; the linked run
    /// is closed out as SKIPPED if it is still paused.
    pub async fn dismiss(&self, actor: &User, id: &str) -> Result<()> {
        let Some(mut input) = self.db.get_pending_input(id).await? else {
            tracing::debug!(pending_input_id = id, "Dismiss of missing input, ignoring");
            return Ok(());
        };

        if input.user_id != actor.user_id && !actor.admin {
            return Err(AppError::Forbidden(
                "Pending input belongs to another user".to_string(),
            ));
        }

        input.status = InputStatus::Dismissed;
        input.updated_at = Utc::now();
        self.db.upsert_pending_input(&input).await?;

        if let Some(mut run) = self.db.get_pipeline_run(&input.execution_id).await? {
            if run.status == RunStatus::WaitingForInput {
                run.status = RunStatus::Skipped;
                run.status_message = Some(format!("Pending input {} dismissed", id));
                run.updated_at = Utc::now();
                self.db.set_pipeline_run(&run).await?;
            }
        }

        tracing::info!(pending_input_id = id, "Pending input dismissed");
        Ok(())
    }

    /// Sweep WAITING auto-populated inputs, asking each owning booster to
    /// poll its external source. Per-input failures are logged and left
    /// WAITING for the next sweep.
    pub async fn poll_auto_inputs(&self) -> Result<PollOutcome> {
        let inputs = self.db.list_waiting_auto_inputs().await?;
        let mut outcome = PollOutcome {
            checked: inputs.len() as u32,
            ..Default::default()
        };

        for input in inputs {
            let Some(kind) = crate::models::BoosterKind::parse(&input.booster_id) else {
                tracing::warn!(
                    pending_input_id = %input.id,
                    booster = %input.booster_id,
                    "Unknown booster on pending input"
                );
                continue;
            };
            let Some(booster) = self.registry.get(kind) else {
                continue;
            };

            match booster.poll_external(&input).await {
                Ok(Some(data)) => {
                    let id = input.id.clone();
                    match self.complete_and_republish(input, data).await {
                        Ok(_) => outcome.resolved += 1,
                        Err(e) => {
                            tracing::warn!(
                                pending_input_id = %id,
                                error = ?e,
                                "Failed to resolve polled input"
                            );
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        pending_input_id = %input.id,
                        error = %e,
                        "Poll failed, leaving input waiting"
                    );
                }
            }
        }

        tracing::info!(
            checked = outcome.checked,
            resolved = outcome.resolved,
            "Pending-input poll sweep complete"
        );
        Ok(outcome)
    }

    /// Mark the input completed and republish its original payload with
    /// resume flags and a fresh execution id.
    async fn complete_and_republish(
        &self,
        mut input: PendingInput,
        input_data: BTreeMap<String, String>,
    ) -> Result<PendingInput> {
        let now = Utc::now();
        input.status = InputStatus::Completed;
        input.input_data = input_data;
        input.updated_at = now;
        input.completed_at = Some(now);
        self.db.upsert_pending_input(&input).await?;

        let stored = self.storage.read(&input.original_payload_uri).await?;
        let mut payload: ActivityPayload = serde_json::from_slice(&stored)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored payload error: {}", e)))?;

        payload.is_resume = true;
        payload.resume_only_boosters = vec![input.booster_id.clone()];
        payload.resume_pending_input_id = Some(input.id.clone());
        payload.activity_id = Some(input.linked_activity_id.clone());
        payload.pipeline_id = Some(input.pipeline_id.clone());
        payload.pipeline_execution_id = Some(ActivityPayload::derive_execution_id(
            &uuid::Uuid::new_v4().to_string(),
            &input.pipeline_id,
        ));

        self.publisher.publish_pipeline_activity(&payload).await?;

        tracing::info!(
            pending_input_id = %input.id,
            pipeline_id = %input.pipeline_id,
            execution_id = ?payload.pipeline_execution_id,
            "Pending input resolved, resume published"
        );
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_is_deterministic() {
        let a = generate_id(ActivitySource::Parkrun, "12345", "race_results");
        let b = generate_id(ActivitySource::Parkrun, "12345", "race_results");
        assert_eq!(a, b);
        assert_eq!(a, "parkrun:12345:race_results");
    }

    #[test]
    fn parse_id_round_trips() {
        let id = generate_id(ActivitySource::Strava, "9876", "user_input");
        let parsed = parse_id(&id).unwrap();
        assert_eq!(parsed.source, "strava");
        assert_eq!(parsed.external_id, "9876");
        assert_eq!(parsed.booster_id, "user_input");
    }

    #[test]
    fn parse_id_keeps_colons_in_trailing_part() {
        let parsed = parse_id("garmin:abc:x:y").unwrap();
        assert_eq!(parsed.external_id, "abc");
        assert_eq!(parsed.booster_id, "x:y");
    }

    #[test]
    fn parse_id_rejects_too_few_parts() {
        assert!(parse_id("no-colons-here").is_err());
        assert!(parse_id("only:one").is_err());
        assert!(parse_id("").is_err());
    }

    #[test]
    fn parse_id_rejects_empty_components() {
        assert!(parse_id("strava::user_input").is_err());
        assert!(parse_id(":123:user_input").is_err());
    }
}
