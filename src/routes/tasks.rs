// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks (and Cloud Scheduler for the
//! poll job), never directly by users. The queue-name check lives in
//! `middleware::tasks_auth`, applied in routes/mod.rs.
//!
//! Status codes are the retry contract: 2xx acks the task, 400 drops a
//! malformed payload for good, 500 asks the queue to redeliver.

use crate::error::Result;
use crate::models::{ActivityPayload, RunStatus};
use crate::services::DispatchOutcome;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/dispatch-activity", post(dispatch_activity))
        .route("/tasks/enrich-activity", post(enrich_activity))
        .route("/tasks/poll-pending-inputs", post(poll_pending_inputs))
}

/// Response for the dispatch handler.
#[derive(Serialize)]
struct DispatchResponse {
    outcome: &'static str,
    matched: u32,
    published: u32,
}

/// Fan a raw activity event out to the user's matching pipelines.
async fn dispatch_activity(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ActivityPayload>,
) -> Result<Json<DispatchResponse>> {
    tracing::info!(
        user_id = %payload.user_id,
        source = %payload.source,
        external_id = %payload.external_id,
        "Dispatching activity from Cloud Task"
    );

    let response = match state.dispatcher.dispatch(&payload).await? {
        DispatchOutcome::PassThrough => DispatchResponse {
            outcome: "pass_through",
            matched: 1,
            published: 1,
        },
        DispatchOutcome::Bounceback => DispatchResponse {
            outcome: "bounceback",
            matched: 0,
            published: 0,
        },
        DispatchOutcome::NoMatch => DispatchResponse {
            outcome: "no_match",
            matched: 0,
            published: 0,
        },
        DispatchOutcome::FanOut { matched, published } => DispatchResponse {
            outcome: "fan_out",
            matched,
            published,
        },
    };

    Ok(Json(response))
}

/// Response for the enrich handler.
#[derive(Serialize)]
struct EnrichResponse {
    status: RunStatus,
    boosters_run: usize,
}

/// Run one pipeline execution for an activity.
///
/// The retry-count header decides whether a retryable booster failure can
/// still lean on queue redelivery; once the budget is spent the run is
/// finalized instead of returning 500 forever.
async fn enrich_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ActivityPayload>,
) -> Result<Json<EnrichResponse>> {
    let retry_count = headers
        .get("x-cloudtasks-taskretrycount")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let do_not_retry = retry_count >= state.config.max_task_retries;

    tracing::info!(
        user_id = %payload.user_id,
        pipeline_id = ?payload.pipeline_id,
        execution_id = ?payload.pipeline_execution_id,
        retry_count,
        is_resume = payload.is_resume,
        "Enriching activity from Cloud Task"
    );

    let outcome = state.orchestrator.process(&payload, do_not_retry).await?;

    Ok(Json(EnrichResponse {
        status: outcome.status,
        boosters_run: outcome.executions.len(),
    }))
}

/// Response for the scheduled poll handler.
#[derive(Serialize)]
struct PollResponse {
    checked: u32,
    resolved: u32,
}

/// Poll external sources for auto-populated pending inputs.
///
/// Triggered by Cloud Scheduler on a fixed cadence.
async fn poll_pending_inputs(State(state): State<Arc<AppState>>) -> Result<Json<PollResponse>> {
    let outcome = state.pending_inputs.poll_auto_inputs().await?;

    if outcome.resolved > 0 {
        tracing::info!(
            checked = outcome.checked,
            resolved = outcome.resolved,
            "Resolved pending inputs from external polling"
        );
    }

    Ok(Json(PollResponse {
        checked: outcome.checked,
        resolved: outcome.resolved,
    }))
}
