// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory [`Database`] implementation backed by `DashMap`.
//!
//! Used by integration tests and by local development without a Firestore
//! emulator. Semantics mirror the Firestore wrapper: upserts overwrite,
//! lists are newest-first.

use crate::db::{counter_doc_id, uploaded_doc_id, Database};
use crate::error::Result;
use crate::models::{
    ActivitySource, Counter, InputStatus, PendingInput, PipelineConfig, PipelineRun,
    UploadedActivityRecord, User,
};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory store keyed the same way the Firestore collections are.
#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, User>,
    pipelines: DashMap<String, PipelineConfig>,
    runs: DashMap<String, PipelineRun>,
    pending_inputs: DashMap<String, PendingInput>,
    counters: DashMap<String, Counter>,
    uploaded: DashMap<String, UploadedActivityRecord>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineConfig>> {
        Ok(self.pipelines.get(pipeline_id).map(|p| p.clone()))
    }

    async fn get_user_pipelines(&self, user_id: &str) -> Result<Vec<PipelineConfig>> {
        Ok(self
            .pipelines
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn upsert_pipeline(&self, pipeline: &PipelineConfig) -> Result<()> {
        self.pipelines.insert(pipeline.id.clone(), pipeline.clone());
        Ok(())
    }

    async fn get_pipeline_run(&self, run_id: &str) -> Result<Option<PipelineRun>> {
        Ok(self.runs.get(run_id).map(|r| r.clone()))
    }

    async fn set_pipeline_run(&self, run: &PipelineRun) -> Result<()> {
        self.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn list_pipeline_runs(&self, user_id: &str, limit: u32) -> Result<Vec<PipelineRun>> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit as usize);
        Ok(runs)
    }

    async fn get_pending_input(&self, id: &str) -> Result<Option<PendingInput>> {
        Ok(self.pending_inputs.get(id).map(|p| p.clone()))
    }

    async fn upsert_pending_input(&self, input: &PendingInput) -> Result<()> {
        self.pending_inputs.insert(input.id.clone(), input.clone());
        Ok(())
    }

    async fn delete_pending_input(&self, id: &str) -> Result<()> {
        self.pending_inputs.remove(id);
        Ok(())
    }

    async fn list_pending_inputs(&self, user_id: &str) -> Result<Vec<PendingInput>> {
        let mut inputs: Vec<PendingInput> = self
            .pending_inputs
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        inputs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inputs)
    }

    async fn list_waiting_auto_inputs(&self) -> Result<Vec<PendingInput>> {
        Ok(self
            .pending_inputs
            .iter()
            .filter(|entry| entry.status == InputStatus::Waiting && entry.auto_populated)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn get_counter(&self, user_id: &str, key: &str) -> Result<Option<Counter>> {
        Ok(self
            .counters
            .get(&counter_doc_id(user_id, key))
            .map(|c| c.clone()))
    }

    async fn set_counter(&self, user_id: &str, counter: &Counter) -> Result<()> {
        self.counters
            .insert(counter_doc_id(user_id, &counter.id), counter.clone());
        Ok(())
    }

    async fn get_uploaded_activity(
        &self,
        user_id: &str,
        source: ActivitySource,
        external_id: &str,
    ) -> Result<Option<UploadedActivityRecord>> {
        Ok(self
            .uploaded
            .get(&uploaded_doc_id(user_id, source, external_id))
            .map(|r| r.clone()))
    }

    async fn set_uploaded_activity(&self, record: &UploadedActivityRecord) -> Result<()> {
        self.uploaded.insert(
            uploaded_doc_id(&record.user_id, record.source, &record.external_id),
            record.clone(),
        );
        Ok(())
    }
}
