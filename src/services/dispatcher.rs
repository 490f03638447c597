// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fan-out dispatcher: one raw activity event becomes one pipeline-queue
//! message per matching enabled pipeline.

use crate::db::Database;
use crate::error::Result;
use crate::models::ActivityPayload;
use crate::services::tasks::Publisher;
use std::sync::Arc;

/// What the dispatcher did with one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Payload already targeted a pipeline; forwarded untouched
    PassThrough,
    /// Event is this system's own upload echoing back from a destination
    Bounceback,
    /// No enabled pipeline listens to this source
    NoMatch,
    /// Fanned out to matching pipelines
    FanOut { matched: u32, published: u32 },
}

/// Routes raw activity events onto per-pipeline queue messages.
pub struct Dispatcher {
    db: Arc<dyn Database>,
    publisher: Arc<dyn Publisher>,
}

impl Dispatcher {
    pub fn new(db: Arc<dyn Database>, publisher: Arc<dyn Publisher>) -> Self {
        Self { db, publisher }
    }

    /// Dispatch one raw event.
    ///
    /// Payloads that already carry a pipeline id (resumes, retargets) pass
    /// through without re-matching. Per-pipeline publish failures are
    /// logged and counted but never fail the other clones; only the
    /// pipeline-list load is allowed to error so the queue redelivers.
    pub async fn dispatch(&self, payload: &ActivityPayload) -> Result<DispatchOutcome> {
        if payload.pipeline_id.is_some() {
            self.publisher.publish_pipeline_activity(payload).await?;
            tracing::info!(
                user_id = %payload.user_id,
                pipeline_id = ?payload.pipeline_id,
                "Pass-through to targeted pipeline"
            );
            return Ok(DispatchOutcome::PassThrough);
        }

        if self.is_bounceback(payload).await? {
            tracing::info!(
                user_id = %payload.user_id,
                source = %payload.source,
                external_id = %payload.external_id,
                "Dropping bounceback of our own upload"
            );
            return Ok(DispatchOutcome::Bounceback);
        }

        let pipelines = self.db.get_user_pipelines(&payload.user_id).await?;
        let matching: Vec<_> = pipelines
            .into_iter()
            .filter(|p| p.enabled && p.source == payload.source)
            .collect();

        if matching.is_empty() {
            tracing::info!(
                user_id = %payload.user_id,
                source = %payload.source,
                "No enabled pipeline for source"
            );
            return Ok(DispatchOutcome::NoMatch);
        }

        let base_id = payload
            .pipeline_execution_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let matched = matching.len() as u32;
        let mut published = 0u32;

        for pipeline in matching {
            let mut clone = payload.clone();
            clone.pipeline_id = Some(pipeline.id.clone());
            clone.pipeline_execution_id = Some(ActivityPayload::derive_execution_id(
                &base_id,
                &pipeline.id,
            ));

            match self.publisher.publish_pipeline_activity(&clone).await {
                Ok(()) => published += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id = %payload.user_id,
                        pipeline_id = %pipeline.id,
                        error = ?e,
                        "Failed to publish pipeline clone"
                    );
                }
            }
        }

        tracing::info!(
            user_id = %payload.user_id,
            source = %payload.source,
            matched,
            published,
            "Fanned out raw event"
        );
        Ok(DispatchOutcome::FanOut { matched, published })
    }

    /// An event whose (source, external id) matches something we uploaded
    /// to that same provider is our own activity coming back.
    async fn is_bounceback(&self, payload: &ActivityPayload) -> Result<bool> {
        let record = self
            .db
            .get_uploaded_activity(&payload.user_id, payload.source, &payload.external_id)
            .await?;
        Ok(record.is_some_and(|r| r.destination == payload.source.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryDb};
    use crate::models::{ActivitySource, PipelineConfig, UploadedActivityRecord};
    use crate::services::tasks::RecordingPublisher;
    use chrono::Utc;

    fn pipeline(id: &str, source: ActivitySource, enabled: bool) -> PipelineConfig {
        PipelineConfig {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: format!("Pipeline {}", id),
            source,
            enabled,
            boosters: vec![],
            destinations: vec![],
        }
    }

    fn raw_payload() -> ActivityPayload {
        ActivityPayload {
            user_id: "u1".to_string(),
            source: ActivitySource::Strava,
            external_id: "act-1".to_string(),
            pipeline_id: None,
            pipeline_execution_id: Some("base-exec".to_string()),
            activity: None,
            payload_uri: None,
            is_resume: false,
            resume_only_boosters: vec![],
            resume_pending_input_id: None,
            activity_id: None,
        }
    }

    async fn setup(pipelines: &[PipelineConfig]) -> (Dispatcher, Arc<RecordingPublisher>) {
        let db = Arc::new(MemoryDb::new());
        for p in pipelines {
            db.upsert_pipeline(p).await.unwrap();
        }
        let publisher = Arc::new(RecordingPublisher::new());
        (
            Dispatcher::new(db, publisher.clone()),
            publisher,
        )
    }

    #[tokio::test]
    async fn fans_out_to_each_matching_pipeline() {
        let (dispatcher, publisher) = setup(&[
            pipeline("p1", ActivitySource::Strava, true),
            pipeline("p2", ActivitySource::Strava, true),
            pipeline("p3", ActivitySource::Garmin, true),
            pipeline("p4", ActivitySource::Strava, false),
        ])
        .await;

        let outcome = dispatcher.dispatch(&raw_payload()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::FanOut {
                matched: 2,
                published: 2
            }
        );

        let mut payloads = publisher.pipeline_payloads();
        payloads.sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
        assert_eq!(payloads.len(), 2);
        assert_eq!(
            payloads[0].pipeline_execution_id.as_deref(),
            Some("base-exec-p1")
        );
        assert_eq!(
            payloads[1].pipeline_execution_id.as_deref(),
            Some("base-exec-p2")
        );
    }

    #[tokio::test]
    async fn publish_failure_does_not_stop_other_clones() {
        let (dispatcher, publisher) = setup(&[
            pipeline("p1", ActivitySource::Strava, true),
            pipeline("p2", ActivitySource::Strava, true),
        ])
        .await;
        publisher.set_fail_pipeline_ids(["p1".to_string()]);

        let outcome = dispatcher.dispatch(&raw_payload()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::FanOut {
                matched: 2,
                published: 1
            }
        );
        assert_eq!(publisher.pipeline_payloads().len(), 1);
    }

    #[tokio::test]
    async fn targeted_payload_passes_through_unchanged() {
        let (dispatcher, publisher) = setup(&[pipeline("p1", ActivitySource::Strava, true)]).await;

        let mut payload = raw_payload();
        payload.pipeline_id = Some("other-pipeline".to_string());

        let outcome = dispatcher.dispatch(&payload).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::PassThrough);

        let payloads = publisher.pipeline_payloads();
        assert_eq!(payloads.len(), 1);
        // No re-matching, no new execution id.
        assert_eq!(payloads[0].pipeline_id.as_deref(), Some("other-pipeline"));
        assert_eq!(
            payloads[0].pipeline_execution_id.as_deref(),
            Some("base-exec")
        );
    }

    #[tokio::test]
    async fn no_matching_pipeline_is_not_an_error() {
        let (dispatcher, publisher) =
            setup(&[pipeline("p1", ActivitySource::Garmin, true)]).await;

        let outcome = dispatcher.dispatch(&raw_payload()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoMatch);
        assert!(publisher.pipeline_payloads().is_empty());
    }

    #[tokio::test]
    async fn own_upload_bounceback_is_dropped() {
        let db = Arc::new(MemoryDb::new());
        db.upsert_pipeline(&pipeline("p1", ActivitySource::Strava, true))
            .await
            .unwrap();
        db.set_uploaded_activity(&UploadedActivityRecord {
            user_id: "u1".to_string(),
            source: ActivitySource::Strava,
            external_id: "act-1".to_string(),
            destination: "strava".to_string(),
            uploaded_at: Utc::now(),
        })
        .await
        .unwrap();
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = Dispatcher::new(db, publisher.clone());

        let outcome = dispatcher.dispatch(&raw_payload()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Bounceback);
        assert!(publisher.pipeline_payloads().is_empty());
    }
}
