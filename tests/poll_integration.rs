// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tests for the scheduled auto-populated input sweep.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use fitpipe::db::{Database, MemoryDb};
use fitpipe::models::{ActivitySource, BoosterKind, InputStatus, PendingInput, StandardizedActivity};
use fitpipe::services::boosters::{
    Booster, BoosterContext, BoosterError, BoosterRegistry, EnrichmentOutput, StepOutcome,
};
use fitpipe::services::{BlobStore, MemoryBlobStore, PendingInputService, RecordingPublisher};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

mod common;

fn auto_input(user_id: &str, id: &str, payload_uri: &str) -> PendingInput {
    PendingInput {
        id: id.to_string(),
        user_id: user_id.to_string(),
        status: InputStatus::Waiting,
        booster_id: "race_results".to_string(),
        required_fields: vec!["position".to_string(), "finish_time".to_string()],
        linked_activity_id: "act-1".to_string(),
        source: ActivitySource::Parkrun,
        external_id: "act-1".to_string(),
        pipeline_id: "p1".to_string(),
        execution_id: "exec-1".to_string(),
        original_payload_uri: payload_uri.to_string(),
        input_data: BTreeMap::new(),
        auto_populated: true,
        metadata: BTreeMap::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        completed_at: None,
    }
}

#[tokio::test]
async fn test_sweep_leaves_unpollable_input_waiting() {
    let app = common::create_test_app();
    common::seed_user(&app.db, "u1", false).await;

    // No results_url in the metadata, so the results source cannot be
    // polled; the sweep must count it and move on.
    app.db
        .upsert_pending_input(&auto_input(
            "u1",
            "parkrun:act-1:race_results",
            "gs://test-payloads/payloads/u1/x.json",
        ))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tasks/poll-pending-inputs")
                .header("x-cloudscheduler", "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["checked"], 1);
    assert_eq!(body["resolved"], 0);

    let input = app
        .db
        .get_pending_input("parkrun:act-1:race_results")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(input.status, InputStatus::Waiting);
    assert!(app.publisher.pipeline_payloads().is_empty());
}

/// Results source whose data is always available.
struct StubResultsSource;

#[async_trait]
impl Booster for StubResultsSource {
    fn kind(&self) -> BoosterKind {
        BoosterKind::RaceResults
    }

    async fn enrich(
        &self,
        _cx: &BoosterContext<'_>,
        _activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        Ok(StepOutcome::Completed(EnrichmentOutput::default()))
    }

    async fn poll_external(
        &self,
        _pending: &PendingInput,
    ) -> Result<Option<BTreeMap<String, String>>, BoosterError> {
        Ok(Some(BTreeMap::from([
            ("position".to_string(), "12".to_string()),
            ("finish_time".to_string(), "21:30".to_string()),
        ])))
    }
}

#[tokio::test]
async fn test_sweep_resolves_available_input_and_republishes() {
    let db = Arc::new(MemoryDb::new());
    let storage = Arc::new(MemoryBlobStore::new("test-payloads"));
    let publisher = Arc::new(RecordingPublisher::new());
    let registry = Arc::new(BoosterRegistry::new().register(Arc::new(StubResultsSource)));
    let service = PendingInputService::new(
        db.clone(),
        storage.clone(),
        publisher.clone(),
        registry,
    );

    common::seed_user(&db, "u1", false).await;

    // The paused execution's original payload, as the pause path stores it
    let mut payload = common::pipeline_payload("u1", "act-1", "p1", "exec-1");
    payload.source = ActivitySource::Parkrun;
    let uri = storage
        .write(
            "payloads/u1/parkrun:act-1:race_results.json",
            serde_json::to_vec(&payload).unwrap(),
        )
        .await
        .unwrap();

    db.upsert_pending_input(&auto_input("u1", "parkrun:act-1:race_results", &uri))
        .await
        .unwrap();

    let outcome = service.poll_auto_inputs().await.unwrap();
    assert_eq!(outcome.checked, 1);
    assert_eq!(outcome.resolved, 1);

    let input = db
        .get_pending_input("parkrun:act-1:race_results")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(input.status, InputStatus::Completed);
    assert_eq!(
        input.input_data.get("position").map(String::as_str),
        Some("12")
    );

    // Resume delivery carries the poller's input id and a fresh execution
    let republished = publisher.pipeline_payloads();
    assert_eq!(republished.len(), 1);
    let resume = &republished[0];
    assert!(resume.is_resume);
    assert_eq!(
        resume.resume_pending_input_id.as_deref(),
        Some("parkrun:act-1:race_results")
    );
    assert_eq!(resume.resume_only_boosters, vec!["race_results".to_string()]);
    assert_eq!(resume.pipeline_id.as_deref(), Some("p1"));
    assert_ne!(resume.pipeline_execution_id.as_deref(), Some("exec-1"));
}
