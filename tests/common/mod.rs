// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{TimeZone, Utc};
use fitpipe::config::Config;
use fitpipe::db::{Database, MemoryDb};
use fitpipe::middleware::auth::create_jwt;
use fitpipe::models::{
    ActivityPayload, ActivitySource, BoosterConfig, BoosterKind, PipelineConfig, Session,
    StandardizedActivity, User,
};
use fitpipe::routes::create_router;
use fitpipe::services::boosters::build_registry;
use fitpipe::services::{
    Dispatcher, MemoryBlobStore, Orchestrator, PendingInputService, RecordingPublisher,
};
use fitpipe::AppState;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Test app with handles into the in-memory fakes.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub storage: Arc<MemoryBlobStore>,
    pub publisher: Arc<RecordingPublisher>,
}

/// Create a test app wired entirely to in-memory fakes.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let config = Config::default();
    let db = Arc::new(MemoryDb::new());
    let storage = Arc::new(MemoryBlobStore::new(&config.payload_bucket));
    let publisher = Arc::new(RecordingPublisher::new());
    let registry = Arc::new(build_registry());

    let pending_inputs = Arc::new(PendingInputService::new(
        db.clone(),
        storage.clone(),
        publisher.clone(),
        registry.clone(),
    ));
    let dispatcher = Dispatcher::new(db.clone(), publisher.clone());
    let orchestrator = Orchestrator::new(
        db.clone(),
        storage.clone(),
        publisher.clone(),
        registry.clone(),
        pending_inputs.clone(),
    );

    let state = Arc::new(AppState {
        config,
        db: db.clone(),
        pending_inputs,
        dispatcher,
        orchestrator,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        storage,
        publisher,
    }
}

/// Cookie header value for an authenticated request.
#[allow(dead_code)]
pub fn auth_cookie(user_id: &str) -> String {
    let token = create_jwt(user_id, &Config::default().jwt_signing_key).expect("JWT creation");
    format!("fitpipe_token={}", token)
}

/// Seed a user into the test database.
#[allow(dead_code)]
pub async fn seed_user(db: &MemoryDb, user_id: &str, admin: bool) -> User {
    let user = User {
        user_id: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id)),
        display_name: format!("Test {}", user_id),
        admin,
        created_at: Utc::now(),
    };
    db.upsert_user(&user).await.expect("seed user");
    user
}

/// Seed an enabled pipeline for a user.
#[allow(dead_code)]
pub async fn seed_pipeline(
    db: &MemoryDb,
    id: &str,
    user_id: &str,
    source: ActivitySource,
    boosters: Vec<BoosterConfig>,
) -> PipelineConfig {
    let pipeline = PipelineConfig {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("Pipeline {}", id),
        source,
        enabled: true,
        boosters,
        destinations: Vec::new(),
    };
    db.upsert_pipeline(&pipeline).await.expect("seed pipeline");
    pipeline
}

/// Booster config with no inputs.
#[allow(dead_code)]
pub fn booster(kind: BoosterKind) -> BoosterConfig {
    BoosterConfig {
        kind,
        inputs: BTreeMap::new(),
        required: false,
    }
}

/// Booster config with inputs.
#[allow(dead_code)]
pub fn booster_with_inputs(kind: BoosterKind, inputs: &[(&str, &str)]) -> BoosterConfig {
    BoosterConfig {
        kind,
        inputs: inputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        required: false,
    }
}

/// A one-session run activity.
#[allow(dead_code)]
pub fn test_activity(user_id: &str, external_id: &str) -> StandardizedActivity {
    let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
    StandardizedActivity {
        source: ActivitySource::Garmin,
        external_id: external_id.to_string(),
        user_id: user_id.to_string(),
        start_time: start,
        name: "Morning Run".to_string(),
        description: "Easy shakeout".to_string(),
        tags: Vec::new(),
        sessions: vec![Session {
            start_time: start,
            total_elapsed_seconds: 1800,
            sport: "running".to_string(),
            laps: Vec::new(),
            strength_sets: Vec::new(),
        }],
        metadata: BTreeMap::new(),
    }
}

/// A pipeline-queue payload targeting one pipeline.
#[allow(dead_code)]
pub fn pipeline_payload(
    user_id: &str,
    external_id: &str,
    pipeline_id: &str,
    execution_id: &str,
) -> ActivityPayload {
    ActivityPayload {
        user_id: user_id.to_string(),
        source: ActivitySource::Garmin,
        external_id: external_id.to_string(),
        pipeline_id: Some(pipeline_id.to_string()),
        pipeline_execution_id: Some(execution_id.to_string()),
        activity: Some(test_activity(user_id, external_id)),
        payload_uri: None,
        is_resume: false,
        resume_only_boosters: Vec::new(),
        resume_pending_input_id: None,
        activity_id: None,
    }
}
