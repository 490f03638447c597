// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication and ownership tests for the user API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use fitpipe::db::Database;
use fitpipe::models::{ActivitySource, InputStatus, PendingInput};
use serde_json::json;
use std::collections::BTreeMap;
use tower::ServiceExt;

mod common;

fn waiting_input(user_id: &str, id: &str) -> PendingInput {
    PendingInput {
        id: id.to_string(),
        user_id: user_id.to_string(),
        status: InputStatus::Waiting,
        booster_id: "user_input".to_string(),
        required_fields: vec!["notes".to_string()],
        linked_activity_id: "act-1".to_string(),
        source: ActivitySource::Garmin,
        external_id: "act-1".to_string(),
        pipeline_id: "p1".to_string(),
        execution_id: "exec-1".to_string(),
        original_payload_uri: "gs://test-payloads/payloads/u/x.json".to_string(),
        input_data: BTreeMap::new(),
        auto_populated: false,
        metadata: BTreeMap::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        completed_at: None,
    }
}

#[tokio::test]
async fn test_api_requires_auth() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/pending-inputs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_rejects_garbage_token() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/pending-inputs")
                .header("authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_pending_inputs_scoped_to_user() {
    let app = common::create_test_app();
    common::seed_user(&app.db, "u1", false).await;
    common::seed_user(&app.db, "u2", false).await;
    app.db
        .upsert_pending_input(&waiting_input("u1", "garmin:act-1:user_input"))
        .await
        .unwrap();
    app.db
        .upsert_pending_input(&waiting_input("u2", "garmin:act-2:user_input"))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/pending-inputs")
                .header("cookie", common::auth_cookie("u1"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let inputs = body["inputs"].as_array().unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0]["user_id"], "u1");
}

#[tokio::test]
async fn test_resolving_another_users_input_forbidden() {
    let app = common::create_test_app();
    common::seed_user(&app.db, "u1", false).await;
    common::seed_user(&app.db, "u2", false).await;
    app.db
        .upsert_pending_input(&waiting_input("u2", "garmin:act-2:user_input"))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/pending-inputs/garmin:act-2:user_input/resolve")
                .header("content-type", "application/json")
                .header("cookie", common::auth_cookie("u1"))
                .body(Body::from(
                    serde_json::to_vec(&json!({ "input_data": { "notes": "x" } })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_may_dismiss_other_users_input() {
    let app = common::create_test_app();
    common::seed_user(&app.db, "admin", true).await;
    common::seed_user(&app.db, "u2", false).await;
    app.db
        .upsert_pending_input(&waiting_input("u2", "garmin:act-2:user_input"))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/pending-inputs/garmin:act-2:user_input/dismiss")
                .header("cookie", common::auth_cookie("admin"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let input = app
        .db
        .get_pending_input("garmin:act-2:user_input")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(input.status, InputStatus::Dismissed);
}

#[tokio::test]
async fn test_resolve_with_empty_input_data_rejected() {
    let app = common::create_test_app();
    common::seed_user(&app.db, "u1", false).await;
    app.db
        .upsert_pending_input(&waiting_input("u1", "garmin:act-1:user_input"))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/pending-inputs/garmin:act-1:user_input/resolve")
                .header("content-type", "application/json")
                .header("cookie", common::auth_cookie("u1"))
                .body(Body::from(
                    serde_json::to_vec(&json!({ "input_data": {} })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
