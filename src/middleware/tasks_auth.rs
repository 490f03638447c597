// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks authentication middleware.
//!
//! `/tasks/*` is reachable only by Cloud Tasks (Cloud Run ingress plus
//! OIDC at the platform layer); the queue-name header check rejects
//! anything that slipped past with the wrong provenance.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};

const KNOWN_QUEUES: &[&str] = &[
    crate::config::RAW_QUEUE_NAME,
    crate::config::PIPELINE_QUEUE_NAME,
    crate::config::ENRICHED_QUEUE_NAME,
];

/// Require a known queue header for `/tasks/*` routes.
///
/// Cloud Scheduler jobs (the pending-input poll) carry `x-cloudscheduler`
/// instead of a queue name, so that header is accepted too.
pub async fn require_tasks_auth(request: Request, next: Next) -> Result<Response, StatusCode> {
    let queue_name_header = request.headers().get("x-cloudtasks-queuename");
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| KNOWN_QUEUES.contains(&name))
        .unwrap_or(false);

    let is_scheduler = request.headers().contains_key("x-cloudscheduler");

    if !is_valid_queue && !is_scheduler {
        tracing::warn!(
            header = ?queue_name_header,
            "Blocked tasks request with invalid queue header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
