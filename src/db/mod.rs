//! Database layer (Firestore, plus an in-memory store for tests and
//! local development).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::Result;
use crate::models::{
    ActivitySource, Counter, PendingInput, PipelineConfig, PipelineRun, UploadedActivityRecord,
    User,
};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PIPELINES: &str = "pipelines";
    pub const PIPELINE_RUNS: &str = "pipeline_runs";
    pub const PENDING_INPUTS: &str = "pending_inputs";
    pub const COUNTERS: &str = "counters";
    /// Activities this system uploaded; consulted for bounceback detection
    pub const UPLOADED_ACTIVITIES: &str = "uploaded_activities";
}

/// Typed persistence operations used by the pipeline services.
///
/// Object-safe so services hold `Arc<dyn Database>` and tests can swap in
/// [`MemoryDb`].
#[async_trait]
pub trait Database: Send + Sync {
    // Users
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    async fn upsert_user(&self, user: &User) -> Result<()>;

    // Pipelines
    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Option<PipelineConfig>>;
    async fn get_user_pipelines(&self, user_id: &str) -> Result<Vec<PipelineConfig>>;
    async fn upsert_pipeline(&self, pipeline: &PipelineConfig) -> Result<()>;

    // Pipeline runs (keyed by execution id)
    async fn get_pipeline_run(&self, run_id: &str) -> Result<Option<PipelineRun>>;
    async fn set_pipeline_run(&self, run: &PipelineRun) -> Result<()>;
    async fn list_pipeline_runs(&self, user_id: &str, limit: u32) -> Result<Vec<PipelineRun>>;

    // Pending inputs (keyed by the stable source:externalId:boosterId id)
    async fn get_pending_input(&self, id: &str) -> Result<Option<PendingInput>>;
    async fn upsert_pending_input(&self, input: &PendingInput) -> Result<()>;
    async fn delete_pending_input(&self, id: &str) -> Result<()>;
    async fn list_pending_inputs(&self, user_id: &str) -> Result<Vec<PendingInput>>;
    /// All WAITING inputs a scheduled poller may auto-populate, across users.
    async fn list_waiting_auto_inputs(&self) -> Result<Vec<PendingInput>>;

    // Counters
    async fn get_counter(&self, user_id: &str, key: &str) -> Result<Option<Counter>>;
    async fn set_counter(&self, user_id: &str, counter: &Counter) -> Result<()>;

    // Uploaded-activity ledger
    async fn get_uploaded_activity(
        &self,
        user_id: &str,
        source: ActivitySource,
        external_id: &str,
    ) -> Result<Option<UploadedActivityRecord>>;
    async fn set_uploaded_activity(&self, record: &UploadedActivityRecord) -> Result<()>;
}

/// Document id for a user-scoped counter.
pub(crate) fn counter_doc_id(user_id: &str, key: &str) -> String {
    format!("{}_{}", user_id, key)
}

/// Document id for an uploaded-activity record.
pub(crate) fn uploaded_doc_id(user_id: &str, source: ActivitySource, external_id: &str) -> String {
    format!("{}_{}_{}", user_id, source.as_str(), external_id)
}
