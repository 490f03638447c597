// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{PendingInput, PipelineRun, User};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

const DEFAULT_RUN_LIMIT: u32 = 50;
const MAX_RUN_LIMIT: u32 = 200;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/pending-inputs", get(list_pending_inputs))
        .route(
            "/api/pending-inputs/{id}/resolve",
            post(resolve_pending_input),
        )
        .route(
            "/api/pending-inputs/{id}/dismiss",
            post(dismiss_pending_input),
        )
        .route("/api/pipeline-runs", get(list_pipeline_runs))
}

/// Load the caller's full profile; auth only proves the token, the
/// profile carries the admin flag ownership checks need.
async fn load_actor(state: &AppState, auth: &AuthUser) -> Result<User> {
    state
        .db
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))
}

// ─── Pending Inputs ──────────────────────────────────────────

/// Pending inputs waiting on the current user.
#[derive(Serialize)]
pub struct PendingInputsResponse {
    pub inputs: Vec<PendingInput>,
}

async fn list_pending_inputs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<PendingInputsResponse>> {
    let inputs = state.db.list_pending_inputs(&auth.user_id).await?;
    Ok(Json(PendingInputsResponse { inputs }))
}

/// Request body for resolving a pending input.
#[derive(Deserialize, Validate)]
pub struct ResolveInputRequest {
    #[validate(length(min = 1, message = "input_data must not be empty"))]
    pub input_data: BTreeMap<String, String>,
}

/// Resolve a pending input with user-supplied values.
///
/// Marks the input completed and republishes the paused execution in
/// resume mode.
async fn resolve_pending_input(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<ResolveInputRequest>,
) -> Result<Json<PendingInput>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let actor = load_actor(&state, &auth).await?;

    tracing::info!(
        user_id = %auth.user_id,
        pending_input_id = %id,
        fields = body.input_data.len(),
        "User resolving pending input"
    );

    let resolved = state
        .pending_inputs
        .resolve(&actor, &id, body.input_data)
        .await?;

    Ok(Json(resolved))
}

/// Response for dismissal.
#[derive(Serialize)]
pub struct DismissResponse {
    pub success: bool,
}

/// Dismiss a pending input without supplying values.
///
/// The linked run, if still waiting, is closed out as skipped.
async fn dismiss_pending_input(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DismissResponse>> {
    let actor = load_actor(&state, &auth).await?;

    tracing::info!(
        user_id = %auth.user_id,
        pending_input_id = %id,
        "User dismissing pending input"
    );

    state.pending_inputs.dismiss(&actor, &id).await?;

    Ok(Json(DismissResponse { success: true }))
}

// ─── Pipeline Runs ───────────────────────────────────────────

#[derive(Deserialize)]
struct RunsQuery {
    /// Maximum number of runs to return, newest first
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct PipelineRunsResponse {
    pub runs: Vec<PipelineRun>,
}

async fn list_pipeline_runs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<PipelineRunsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_RUN_LIMIT).min(MAX_RUN_LIMIT);
    let runs = state.db.list_pipeline_runs(&auth.user_id, limit).await?;
    Ok(Json(PipelineRunsResponse { runs }))
}
