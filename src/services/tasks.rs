// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks publishing between pipeline stages.
//!
//! Each logical topic is a Cloud Tasks queue whose tasks POST back to the
//! matching `/tasks/*` handler:
//! - pipeline-activity -> /tasks/enrich-activity
//! - enriched-activity -> the destination dispatch service
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::config;
use crate::error::{AppError, Result};
use crate::models::{ActivityPayload, EnrichedActivityEvent};
use async_trait::async_trait;
use serde::Serialize;

/// Queue publishing seam between pipeline stages.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a per-pipeline payload for the orchestrator.
    async fn publish_pipeline_activity(&self, payload: &ActivityPayload) -> Result<()>;

    /// Publish a finished enrichment result toward destination dispatch.
    async fn publish_enriched_activity(&self, event: &EnrichedActivityEvent) -> Result<()>;
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    /// Base URL tasks POST back to
    service_url: String,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str, service_url: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            service_url: service_url.to_string(),
        }
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        queue_name: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Queue(format!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, queue_name
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", self.service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "fitpipe-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(self.service_url.clone()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Queue(format!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Publisher for TasksService {
    async fn publish_pipeline_activity(&self, payload: &ActivityPayload) -> Result<()> {
        self.queue_task(
            config::PIPELINE_QUEUE_NAME,
            "/tasks/enrich-activity",
            payload,
        )
        .await
    }

    async fn publish_enriched_activity(&self, event: &EnrichedActivityEvent) -> Result<()> {
        self.queue_task(config::ENRICHED_QUEUE_NAME, "/tasks/deliver-activity", event)
            .await
    }
}

/// Publisher that records everything it is given.
///
/// Used by integration tests and local development; pipeline ids can be
/// marked to fail so partial fan-out behavior is testable.
#[derive(Default)]
pub struct RecordingPublisher {
    pipeline_payloads: std::sync::Mutex<Vec<ActivityPayload>>,
    enriched_events: std::sync::Mutex<Vec<EnrichedActivityEvent>>,
    fail_pipeline_ids: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pipeline ids whose publishes should fail.
    pub fn set_fail_pipeline_ids(&self, ids: impl IntoIterator<Item = String>) {
        let mut guard = self.fail_pipeline_ids.lock().unwrap();
        guard.clear();
        guard.extend(ids);
    }

    /// Snapshot of recorded pipeline-activity payloads.
    pub fn pipeline_payloads(&self) -> Vec<ActivityPayload> {
        self.pipeline_payloads.lock().unwrap().clone()
    }

    /// Snapshot of recorded enriched-activity events.
    pub fn enriched_events(&self) -> Vec<EnrichedActivityEvent> {
        self.enriched_events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_pipeline_activity(&self, payload: &ActivityPayload) -> Result<()> {
        if let Some(pipeline_id) = &payload.pipeline_id {
            if self.fail_pipeline_ids.lock().unwrap().contains(pipeline_id) {
                return Err(AppError::Queue(format!(
                    "Injected publish failure for {}",
                    pipeline_id
                )));
            }
        }
        self.pipeline_payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn publish_enriched_activity(&self, event: &EnrichedActivityEvent) -> Result<()> {
        self.enriched_events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
