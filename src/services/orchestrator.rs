// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Enrichment orchestrator: runs one activity through one pipeline's
//! ordered booster chain and publishes the merged result.
//!
//! A run moves RUNNING -> SUCCESS | FAILED | SKIPPED | WAITING_FOR_INPUT.
//! The same entry point serves fresh executions and resumed ones; resume
//! deliveries restrict execution to the boosters named on the payload.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    ActivityPayload, BoosterExecution, EnrichedActivityEvent, PendingInput,
    PipelineConfig, PipelineRun, Record, RunStatus, StandardizedActivity, StepStatus, TimedSample,
};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterRegistry, EnrichmentOutput, StepOutcome,
};
use crate::services::pending_input::{generate_id, PendingInputService};
use crate::services::reconciler;
use crate::services::storage::BlobStore;
use crate::services::tasks::Publisher;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Below this fraction of session coverage, lap records are expanded to
/// per-second resolution before a sample stream is written onto them.
const SPARSE_RECORD_THRESHOLD: f64 = 0.25;

/// Result of one orchestration delivery.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub status: RunStatus,
    pub executions: Vec<BoosterExecution>,
}

/// Accumulates merge state across the booster chain.
struct MergeState {
    /// Position-ordered description slots; slot 0 is the original text
    slots: Vec<String>,
    metadata: BTreeMap<String, String>,
    applied: Vec<String>,
}

pub struct Orchestrator {
    db: Arc<dyn Database>,
    storage: Arc<dyn BlobStore>,
    publisher: Arc<dyn Publisher>,
    registry: Arc<BoosterRegistry>,
    pending_inputs: Arc<PendingInputService>,
}

impl Orchestrator {
    pub fn new(
        db: Arc<dyn Database>,
        storage: Arc<dyn BlobStore>,
        publisher: Arc<dyn Publisher>,
        registry: Arc<BoosterRegistry>,
        pending_inputs: Arc<PendingInputService>,
    ) -> Self {
        Self {
            db,
            storage,
            publisher,
            registry,
            pending_inputs,
        }
    }

    /// Process one pipeline-queue delivery.
    ///
    /// `do_not_retry` is set once the queue's redelivery budget is spent;
    /// retryable step errors are then treated as fatal for that step.
    pub async fn process(
        &self,
        payload: &ActivityPayload,
        do_not_retry: bool,
    ) -> Result<ProcessOutcome> {
        let pipeline_id = payload
            .pipeline_id
            .as_deref()
            .ok_or_else(|| AppError::Validation("Payload has no pipeline id".to_string()))?;
        let execution_id = payload
            .pipeline_execution_id
            .as_deref()
            .ok_or_else(|| AppError::Validation("Payload has no execution id".to_string()))?;

        if payload.is_resume && payload.activity_id.is_none() {
            return Err(AppError::Validation(
                "Resume payload has no activity id".to_string(),
            ));
        }

        let pipeline = self
            .db
            .get_pipeline(pipeline_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown pipeline {}", pipeline_id)))?;
        if pipeline.user_id != payload.user_id {
            return Err(AppError::Validation(
                "Pipeline belongs to another user".to_string(),
            ));
        }

        // At-least-once dedup: a finished run is never re-executed.
        if let Some(existing) = self.db.get_pipeline_run(execution_id).await? {
            if existing.status != RunStatus::Running {
                tracing::info!(
                    execution_id,
                    status = ?existing.status,
                    "Run already settled, acknowledging redelivery"
                );
                return Ok(ProcessOutcome {
                    status: existing.status,
                    executions: existing.boosters,
                });
            }
        }

        let user = self
            .db
            .get_user(&payload.user_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown user {}", payload.user_id)))?;

        let mut activity = self.resolve_activity(payload).await?;
        let resumed_input = self.resolve_pending_input(payload).await?;

        let mut run = self
            .create_run(payload, &pipeline, &activity, execution_id)
            .await?;

        if !payload.is_resume {
            self.clear_stale_inputs(&pipeline, &activity).await;
        }

        let mut merge = MergeState {
            slots: if activity.description.is_empty() {
                vec![]
            } else {
                vec![activity.description.clone()]
            },
            metadata: BTreeMap::new(),
            applied: vec![],
        };

        for step in &pipeline.boosters {
            let kind_str = step.kind.as_str();

            if payload.is_resume
                && !payload.resume_only_boosters.iter().any(|b| b == kind_str)
            {
                run.boosters.push(BoosterExecution {
                    booster: kind_str.to_string(),
                    status: StepStatus::Skipped,
                    error: None,
                    duration_ms: 0,
                });
                continue;
            }

            let Some(booster) = self.registry.get(step.kind) else {
                let message = format!("No booster registered for {}", kind_str);
                tracing::error!(execution_id, booster = kind_str, "{}", message);
                run.boosters.push(BoosterExecution {
                    booster: kind_str.to_string(),
                    status: StepStatus::Failed,
                    error: Some(message.clone()),
                    duration_ms: 0,
                });
                if step.required {
                    return self.finish(run, RunStatus::Failed, Some(message)).await;
                }
                continue;
            };

            let cx = BoosterContext {
                db: self.db.as_ref(),
                storage: self.storage.as_ref(),
                user: &user,
                execution_id,
                inputs: &step.inputs,
            };

            let started = Instant::now();
            let outcome = self
                .run_step(&cx, booster.as_ref(), &activity, payload, &resumed_input)
                .await;
            let duration_ms = started.elapsed().as_millis() as i64;

            match outcome {
                Ok(StepOutcome::Completed(output)) => {
                    if output.halt {
                        let reason = output
                            .halt_reason
                            .clone()
                            .unwrap_or_else(|| "Halted by booster".to_string());
                        run.boosters.push(BoosterExecution {
                            booster: kind_str.to_string(),
                            status: StepStatus::Halted,
                            error: None,
                            duration_ms,
                        });
                        tracing::info!(execution_id, booster = kind_str, reason = %reason, "Pipeline halted");
                        return self.finish(run, RunStatus::Skipped, Some(reason)).await;
                    }

                    apply_output(&mut activity, &output, &mut merge);
                    merge.applied.push(kind_str.to_string());
                    run.boosters.push(BoosterExecution {
                        booster: kind_str.to_string(),
                        status: StepStatus::Success,
                        error: None,
                        duration_ms,
                    });
                }
                Ok(StepOutcome::WaitingForInput(request)) => {
                    let pending = self
                        .pending_inputs
                        .pause(payload, &activity, kind_str, execution_id, request)
                        .await?;
                    run.boosters.push(BoosterExecution {
                        booster: kind_str.to_string(),
                        status: StepStatus::Waiting,
                        error: None,
                        duration_ms,
                    });
                    return self
                        .finish(
                            run,
                            RunStatus::WaitingForInput,
                            Some(format!("Waiting on {}", pending.id)),
                        )
                        .await;
                }
                Err(e) if e.retryable && !do_not_retry => {
                    // Keep the run RUNNING and let the queue redeliver the
                    // whole execution.
                    run.status_message =
                        Some(format!("{} failed, awaiting retry: {}", kind_str, e));
                    run.updated_at = Utc::now();
                    self.db.set_pipeline_run(&run).await?;
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "Booster {} failed (retryable): {}",
                        kind_str,
                        e
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        execution_id,
                        booster = kind_str,
                        error = %e,
                        "Booster failed"
                    );
                    run.boosters.push(BoosterExecution {
                        booster: kind_str.to_string(),
                        status: StepStatus::Failed,
                        error: Some(e.message.clone()),
                        duration_ms,
                    });
                    if step.required {
                        return self
                            .finish(
                                run,
                                RunStatus::Failed,
                                Some(format!("Required booster {} failed: {}", kind_str, e)),
                            )
                            .await;
                    }
                }
            }
        }

        // Final description from the ordered slots.
        activity.description = merge.slots.join("\n\n");
        activity
            .metadata
            .extend(merge.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

        let event = EnrichedActivityEvent {
            user_id: payload.user_id.clone(),
            pipeline_id: pipeline.id.clone(),
            pipeline_execution_id: execution_id.to_string(),
            activity: activity.clone(),
            applied_boosters: merge.applied.clone(),
            metadata: merge.metadata,
            destinations: pipeline.destinations.clone(),
        };
        self.publisher.publish_enriched_activity(&event).await?;

        run.title = activity.name.clone();
        self.finish(run, RunStatus::Success, None).await
    }

    async fn run_step(
        &self,
        cx: &BoosterContext<'_>,
        booster: &dyn Booster,
        activity: &StandardizedActivity,
        payload: &ActivityPayload,
        resumed_input: &Option<PendingInput>,
    ) -> std::result::Result<StepOutcome, crate::services::boosters::BoosterError> {
        if payload.is_resume {
            if let Some(pending) = resumed_input {
                if pending.booster_id == booster.kind().as_str() {
                    return booster.enrich_resume(cx, activity, pending).await;
                }
            }
        }
        booster.enrich(cx, activity).await
    }

    /// Resolve the activity body, inline or by storage reference.
    async fn resolve_activity(&self, payload: &ActivityPayload) -> Result<StandardizedActivity> {
        if let Some(activity) = &payload.activity {
            return Ok(activity.clone());
        }
        if let Some(uri) = &payload.payload_uri {
            let body = self.storage.read(uri).await?;
            return serde_json::from_slice(&body).map_err(|e| {
                AppError::Validation(format!("Referenced activity is malformed: {}", e))
            });
        }
        Err(AppError::Validation(
            "Payload has neither inline activity nor payload_uri".to_string(),
        ))
    }

    /// Fetch the pending input a resume delivery names.
    async fn resolve_pending_input(
        &self,
        payload: &ActivityPayload,
    ) -> Result<Option<PendingInput>> {
        let Some(id) = &payload.resume_pending_input_id else {
            return Ok(None);
        };
        let input = self
            .db
            .get_pending_input(id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown pending input {}", id)))?;
        Ok(Some(input))
    }

    /// Create the RUNNING run record and offload the original payload.
    async fn create_run(
        &self,
        payload: &ActivityPayload,
        pipeline: &PipelineConfig,
        activity: &StandardizedActivity,
        execution_id: &str,
    ) -> Result<PipelineRun> {
        // The pristine payload is kept for inspection and replay. Losing
        // it is not worth failing the run over.
        let original_payload_uri = match serde_json::to_vec(payload) {
            Ok(body) => {
                let path = format!("runs/{}/original.json", execution_id);
                match self.storage.write(&path, body).await {
                    Ok(uri) => Some(uri),
                    Err(e) => {
                        tracing::warn!(execution_id, error = ?e, "Could not offload original payload");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(execution_id, error = %e, "Could not serialize original payload");
                None
            }
        };

        let now = Utc::now();
        let run = PipelineRun {
            id: execution_id.to_string(),
            user_id: payload.user_id.clone(),
            pipeline_id: pipeline.id.clone(),
            activity_id: payload
                .activity_id
                .clone()
                .unwrap_or_else(|| activity.external_id.clone()),
            source: activity.source,
            source_activity_id: activity.external_id.clone(),
            title: activity.name.clone(),
            status: RunStatus::Running,
            status_message: None,
            boosters: vec![],
            destinations: vec![],
            original_payload_uri,
            created_at: now,
            updated_at: now,
        };
        self.db.set_pipeline_run(&run).await?;
        Ok(run)
    }

    /// Delete WAITING pending inputs left over from earlier runs of the
    /// same activity, so a fresh run can request input anew. Best effort.
    async fn clear_stale_inputs(&self, pipeline: &PipelineConfig, activity: &StandardizedActivity) {
        for step in &pipeline.boosters {
            let id = generate_id(activity.source, &activity.external_id, step.kind.as_str());
            match self.db.get_pending_input(&id).await {
                Ok(Some(input)) if input.status == crate::models::InputStatus::Waiting => {
                    if let Err(e) = self.db.delete_pending_input(&id).await {
                        tracing::warn!(pending_input_id = %id, error = ?e, "Stale input cleanup failed");
                    } else {
                        tracing::debug!(pending_input_id = %id, "Cleared stale pending input");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(pending_input_id = %id, error = ?e, "Stale input lookup failed");
                }
            }
        }
    }

    /// Write the run's terminal (or paused) state and return the outcome.
    async fn finish(
        &self,
        mut run: PipelineRun,
        status: RunStatus,
        status_message: Option<String>,
    ) -> Result<ProcessOutcome> {
        run.status = status;
        run.status_message = status_message;
        run.updated_at = Utc::now();
        self.db.set_pipeline_run(&run).await?;

        tracing::info!(
            execution_id = %run.id,
            pipeline_id = %run.pipeline_id,
            status = ?status,
            "Run finished"
        );
        Ok(ProcessOutcome {
            status,
            executions: run.boosters,
        })
    }
}

/// Merge one booster's output into the activity and merge state.
fn apply_output(
    activity: &mut StandardizedActivity,
    output: &EnrichmentOutput,
    merge: &mut MergeState,
) {
    if let Some(name) = &output.name_override {
        activity.name = name.clone();
    }
    if let Some(suffix) = &output.name_suffix {
        activity.name.push_str(suffix);
    }
    if let Some(description) = &output.description {
        merge.slots.push(description.clone());
    }
    for tag in &output.tags {
        if !activity.tags.contains(tag) {
            activity.tags.push(tag.clone());
        }
    }
    for (key, value) in &output.metadata {
        // Later boosters win on key conflicts.
        merge.metadata.insert(key.clone(), value.clone());
    }
    if let Some(samples) = &output.heart_rate_samples {
        apply_heart_rate_stream(activity, samples);
    }
}

/// Align a raw sample stream onto the activity timeline and write it onto
/// the lap records.
fn apply_heart_rate_stream(activity: &mut StandardizedActivity, samples: &[TimedSample]) {
    let duration = activity.total_duration_seconds();
    if duration == 0 || samples.is_empty() {
        return;
    }

    let reconciled = reconciler::reconcile(activity.start_time, duration, samples);
    tracing::debug!(
        duration,
        samples = samples.len(),
        strategy = ?reconciled.strategy,
        "Reconciled heart-rate stream"
    );

    if record_coverage(activity) < SPARSE_RECORD_THRESHOLD {
        expand_lap_records(activity);
    }

    let start = activity.start_time;
    for session in &mut activity.sessions {
        for lap in &mut session.laps {
            for record in &mut lap.records {
                let offset = (record.timestamp - start).num_seconds();
                if offset >= 0 && (offset as usize) < reconciled.values.len() {
                    let value = reconciled.values[offset as usize];
                    if value > 0 {
                        record.heart_rate = Some(value);
                    }
                }
            }
        }
    }
}

/// Fraction of the activity duration covered by existing records.
fn record_coverage(activity: &StandardizedActivity) -> f64 {
    let duration = activity.total_duration_seconds();
    if duration == 0 {
        return 1.0;
    }
    let records: usize = activity
        .sessions
        .iter()
        .flat_map(|s| &s.laps)
        .map(|l| l.records.len())
        .sum();
    records as f64 / duration as f64
}

/// Give every lap one record per second so a dense stream has somewhere
/// to land. Existing records are kept.
fn expand_lap_records(activity: &mut StandardizedActivity) {
    for session in &mut activity.sessions {
        for lap in &mut session.laps {
            if lap.records.len() as u32 >= lap.total_elapsed_seconds {
                continue;
            }
            let existing: std::collections::HashSet<i64> = lap
                .records
                .iter()
                .map(|r| r.timestamp.timestamp())
                .collect();
            for second in 0..lap.total_elapsed_seconds {
                let timestamp = lap.start_time + chrono::Duration::seconds(second as i64);
                if !existing.contains(&timestamp.timestamp()) {
                    lap.records.push(Record {
                        timestamp,
                        heart_rate: None,
                        power: None,
                        position_lat: None,
                        position_long: None,
                    });
                }
            }
            lap.records.sort_by_key(|r| r.timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivitySource, Lap, Session};
    use chrono::TimeZone;

    fn dense_activity(duration: u32) -> StandardizedActivity {
        let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        StandardizedActivity {
            source: ActivitySource::Garmin,
            external_id: "g1".to_string(),
            user_id: "u1".to_string(),
            start_time: start,
            name: "Run".to_string(),
            description: String::new(),
            tags: vec![],
            sessions: vec![Session {
                start_time: start,
                total_elapsed_seconds: duration,
                sport: "running".to_string(),
                laps: vec![Lap {
                    start_time: start,
                    total_elapsed_seconds: duration,
                    records: vec![],
                }],
                strength_sets: vec![],
            }],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn sparse_laps_expand_to_per_second_records() {
        let mut activity = dense_activity(60);
        let samples: Vec<TimedSample> = (0..60)
            .map(|i| TimedSample {
                timestamp: activity.start_time + chrono::Duration::seconds(i),
                value: 100 + i as u32,
            })
            .collect();

        apply_heart_rate_stream(&mut activity, &samples);

        let lap = &activity.sessions[0].laps[0];
        assert_eq!(lap.records.len(), 60);
        assert_eq!(lap.records[0].heart_rate, Some(100));
        assert_eq!(lap.records[59].heart_rate, Some(159));
    }

    #[test]
    fn existing_dense_records_are_annotated_in_place() {
        let mut activity = dense_activity(10);
        let start = activity.start_time;
        activity.sessions[0].laps[0].records = (0..10)
            .map(|i| Record {
                timestamp: start + chrono::Duration::seconds(i),
                heart_rate: None,
                power: Some(200),
                position_lat: None,
                position_long: None,
            })
            .collect();
        let samples: Vec<TimedSample> = (0..10)
            .map(|i| TimedSample {
                timestamp: start + chrono::Duration::seconds(i),
                value: 90 + i as u32,
            })
            .collect();

        apply_heart_rate_stream(&mut activity, &samples);

        let lap = &activity.sessions[0].laps[0];
        assert_eq!(lap.records.len(), 10);
        assert_eq!(lap.records[3].heart_rate, Some(93));
        // Other channels untouched.
        assert_eq!(lap.records[3].power, Some(200));
    }

    #[test]
    fn apply_output_orders_description_slots() {
        let mut activity = dense_activity(10);
        activity.description = "Original".to_string();
        let mut merge = MergeState {
            slots: vec![activity.description.clone()],
            metadata: BTreeMap::new(),
            applied: vec![],
        };

        apply_output(
            &mut activity,
            &EnrichmentOutput {
                description: Some("First".to_string()),
                ..Default::default()
            },
            &mut merge,
        );
        apply_output(
            &mut activity,
            &EnrichmentOutput {
                description: Some("Second".to_string()),
                ..Default::default()
            },
            &mut merge,
        );

        assert_eq!(merge.slots.join("\n\n"), "Original\n\nFirst\n\nSecond");
    }

    #[test]
    fn apply_output_name_override_then_suffix() {
        let mut activity = dense_activity(10);
        let mut merge = MergeState {
            slots: vec![],
            metadata: BTreeMap::new(),
            applied: vec![],
        };

        apply_output(
            &mut activity,
            &EnrichmentOutput {
                name_override: Some("Club Championship".to_string()),
                name_suffix: Some(" (#7)".to_string()),
                ..Default::default()
            },
            &mut merge,
        );

        assert_eq!(activity.name, "Club Championship (#7)");
    }

    #[test]
    fn later_metadata_wins() {
        let mut activity = dense_activity(10);
        let mut merge = MergeState {
            slots: vec![],
            metadata: BTreeMap::new(),
            applied: vec![],
        };

        apply_output(
            &mut activity,
            &EnrichmentOutput {
                metadata: BTreeMap::from([("k".to_string(), "first".to_string())]),
                ..Default::default()
            },
            &mut merge,
        );
        apply_output(
            &mut activity,
            &EnrichmentOutput {
                metadata: BTreeMap::from([("k".to_string(), "second".to_string())]),
                ..Default::default()
            },
            &mut merge,
        );

        assert_eq!(merge.metadata.get("k").map(String::as_str), Some("second"));
    }
}
