// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage)
//! - Pipelines (per-user enrichment configuration)
//! - Pipeline runs (execution history, keyed by execution id)
//! - Pending inputs (paused executions waiting for data)
//! - Counters and the uploaded-activity ledger

use crate::db::{collections, counter_doc_id, uploaded_doc_id, Database};
use crate::error::AppError;
use crate::models::{
    ActivitySource, Counter, PendingInput, PipelineConfig, PipelineRun, UploadedActivityRecord,
    User,
};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

}

#[async_trait]
impl Database for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Pipeline Operations ─────────────────────────────────────

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineConfig>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PIPELINES)
            .obj()
            .one(pipeline_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_user_pipelines(&self, user_id: &str) -> Result<Vec<PipelineConfig>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PIPELINES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_pipeline(&self, pipeline: &PipelineConfig) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PIPELINES)
            .document_id(&pipeline.id)
            .object(pipeline)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Pipeline Run Operations ─────────────────────────────────

    async fn get_pipeline_run(&self, run_id: &str) -> Result<Option<PipelineRun>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PIPELINE_RUNS)
            .obj()
            .one(run_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_pipeline_run(&self, run: &PipelineRun) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PIPELINE_RUNS)
            .document_id(&run.id)
            .object(run)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_pipeline_runs(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<PipelineRun>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PIPELINE_RUNS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Pending Input Operations ────────────────────────────────

    async fn get_pending_input(&self, id: &str) -> Result<Option<PendingInput>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PENDING_INPUTS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_pending_input(&self, input: &PendingInput) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PENDING_INPUTS)
            .document_id(&input.id)
            .object(input)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_pending_input(&self, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::PENDING_INPUTS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_pending_inputs(&self, user_id: &str) -> Result<Vec<PendingInput>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PENDING_INPUTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_waiting_auto_inputs(&self) -> Result<Vec<PendingInput>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PENDING_INPUTS)
            .filter(|q| {
                q.for_all([
                    q.field("status").eq("WAITING"),
                    q.field("auto_populated").eq(true),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Counter Operations ──────────────────────────────────────

    async fn get_counter(&self, user_id: &str, key: &str) -> Result<Option<Counter>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COUNTERS)
            .obj()
            .one(&counter_doc_id(user_id, key))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_counter(&self, user_id: &str, counter: &Counter) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COUNTERS)
            .document_id(counter_doc_id(user_id, &counter.id))
            .object(counter)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Uploaded-Activity Ledger ────────────────────────────────

    async fn get_uploaded_activity(
        &self,
        user_id: &str,
        source: ActivitySource,
        external_id: &str,
    ) -> Result<Option<UploadedActivityRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::UPLOADED_ACTIVITIES)
            .obj()
            .one(&uploaded_doc_id(user_id, source, external_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_uploaded_activity(
        &self,
        record: &UploadedActivityRecord,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::UPLOADED_ACTIVITIES)
            .document_id(uploaded_doc_id(
                record.user_id.as_str(),
                record.source,
                &record.external_id,
            ))
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
