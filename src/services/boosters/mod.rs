// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booster trait, registry, and the built-in boosters.
//!
//! A booster never mutates the activity directly; it returns an
//! [`EnrichmentOutput`] the orchestrator merges deterministically, or a
//! pause request the orchestrator turns into a pending input.

mod auto_increment;
mod heart_rate_file;
mod logic_gate;
mod race_results;
mod user_input;
mod workout_summary;

pub use auto_increment::AutoIncrementBooster;
pub use heart_rate_file::HeartRateFileBooster;
pub use logic_gate::LogicGateBooster;
pub use race_results::RaceResultsBooster;
pub use user_input::UserInputBooster;
pub use workout_summary::WorkoutSummaryBooster;

use crate::db::Database;
use crate::models::{
    BoosterKind, PendingInput, StandardizedActivity, TimedSample, User,
};
use crate::services::storage::BlobStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What a completed booster wants merged into the activity.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutput {
    /// Text for this booster's description slot
    pub description: Option<String>,
    /// Replaces the activity name outright
    pub name_override: Option<String>,
    /// Appended to the activity name after any override
    pub name_suffix: Option<String>,
    /// Tags to append
    pub tags: Vec<String>,
    /// Metadata entries; later boosters win on key conflicts
    pub metadata: BTreeMap<String, String>,
    /// Raw heart-rate stream, aligned by the reconciler before merging
    pub heart_rate_samples: Option<Vec<TimedSample>>,
    /// Terminate the pipeline without running further steps
    pub halt: bool,
    pub halt_reason: Option<String>,
}

/// A booster's request to pause the pipeline until data arrives.
#[derive(Debug, Clone, Default)]
pub struct InputRequest {
    /// Field names the booster needs filled in
    pub required_fields: Vec<String>,
    /// Display hints and poller parameters, persisted on the pending input
    pub metadata: BTreeMap<String, String>,
    /// True when a scheduled poller can fill the fields without a human
    pub auto_populated: bool,
}

/// Tagged step result: the pause path is a variant, not an error.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed(EnrichmentOutput),
    WaitingForInput(InputRequest),
}

/// A booster-level failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct BoosterError {
    pub message: String,
    /// Transient failures are worth redelivering the whole execution for
    pub retryable: bool,
}

impl BoosterError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Everything a booster may reach during one execution.
pub struct BoosterContext<'a> {
    pub db: &'a dyn Database,
    pub storage: &'a dyn BlobStore,
    pub user: &'a User,
    pub execution_id: &'a str,
    /// This step's configured inputs, parsed by the booster itself
    pub inputs: &'a BTreeMap<String, String>,
}

/// One enrichment step implementation.
#[async_trait]
pub trait Booster: Send + Sync {
    fn kind(&self) -> BoosterKind;

    /// Run the step against the activity.
    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError>;

    /// Run the step with a resolved pending input. Only called in resume
    /// mode, and only for boosters that pause.
    async fn enrich_resume(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
        pending: &PendingInput,
    ) -> Result<StepOutcome, BoosterError> {
        let _ = (cx, activity, pending);
        Err(BoosterError::fatal(format!(
            "{} does not support resume",
            self.kind()
        )))
    }

    /// Try to fetch input data from an external source for an
    /// auto-populated pending input. `Ok(None)` means not available yet.
    async fn poll_external(
        &self,
        pending: &PendingInput,
    ) -> Result<Option<BTreeMap<String, String>>, BoosterError> {
        let _ = pending;
        Ok(None)
    }
}

/// Typed booster lookup, built once at startup and injected everywhere.
#[derive(Default)]
pub struct BoosterRegistry {
    by_kind: HashMap<BoosterKind, Arc<dyn Booster>>,
}

impl BoosterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, booster: Arc<dyn Booster>) -> Self {
        self.by_kind.insert(booster.kind(), booster);
        self
    }

    pub fn get(&self, kind: BoosterKind) -> Option<Arc<dyn Booster>> {
        self.by_kind.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<BoosterKind> {
        self.by_kind.keys().copied().collect()
    }
}

/// Registry with every built-in booster.
pub fn build_registry() -> BoosterRegistry {
    BoosterRegistry::new()
        .register(Arc::new(UserInputBooster))
        .register(Arc::new(RaceResultsBooster))
        .register(Arc::new(LogicGateBooster))
        .register(Arc::new(AutoIncrementBooster))
        .register(Arc::new(WorkoutSummaryBooster))
        .register(Arc::new(HeartRateFileBooster))
}
