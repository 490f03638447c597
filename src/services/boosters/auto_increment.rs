// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Maintains a per-user counter and stamps its value onto the activity
//! name, e.g. "Saturday parkrun (#42)".
//!
//! The counter document records the execution id that performed the last
//! increment, so a redelivered execution reuses its count instead of
//! incrementing again.

use crate::models::{BoosterKind, Counter, StandardizedActivity};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterError, EnrichmentOutput, StepOutcome,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;

/// Typed view of this step's configured inputs.
#[derive(Debug)]
struct AutoIncrementConfig {
    /// Counter key, scoped to the user
    counter_key: String,
}

impl AutoIncrementConfig {
    fn parse(inputs: &BTreeMap<String, String>) -> Result<Self, BoosterError> {
        let counter_key = inputs
            .get("counter_key")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| BoosterError::fatal("auto_increment requires counter_key"))?;
        Ok(Self { counter_key })
    }
}

pub struct AutoIncrementBooster;

#[async_trait]
impl Booster for AutoIncrementBooster {
    fn kind(&self) -> BoosterKind {
        BoosterKind::AutoIncrement
    }

    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        let config = AutoIncrementConfig::parse(cx.inputs)?;

        let existing = cx
            .db
            .get_counter(&activity.user_id, &config.counter_key)
            .await
            .map_err(|e| BoosterError::retryable(format!("Counter read failed: {}", e)))?;

        let count = match &existing {
            // Redelivered execution: the increment already happened.
            Some(counter) if counter.last_execution_id.as_deref() == Some(cx.execution_id) => {
                counter.count
            }
            Some(counter) => counter.count + 1,
            None => 1,
        };

        let updated = Counter {
            id: config.counter_key.clone(),
            count,
            last_execution_id: Some(cx.execution_id.to_string()),
            updated_at: Utc::now(),
        };
        cx.db
            .set_counter(&activity.user_id, &updated)
            .await
            .map_err(|e| BoosterError::retryable(format!("Counter write failed: {}", e)))?;

        Ok(StepOutcome::Completed(EnrichmentOutput {
            name_suffix: Some(format!(" (#{})", count)),
            metadata: BTreeMap::from([(
                format!("counter.{}", config.counter_key),
                count.to_string(),
            )]),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryDb};
    use crate::models::{ActivitySource, User};
    use crate::services::storage::MemoryBlobStore;

    fn activity() -> StandardizedActivity {
        StandardizedActivity {
            source: ActivitySource::Parkrun,
            external_id: "e1".to_string(),
            user_id: "u1".to_string(),
            start_time: Utc::now(),
            name: "Saturday parkrun".to_string(),
            description: String::new(),
            tags: vec![],
            sessions: vec![],
            metadata: BTreeMap::new(),
        }
    }

    fn user() -> User {
        User {
            user_id: "u1".to_string(),
            email: None,
            display_name: "Test".to_string(),
            admin: false,
            created_at: Utc::now(),
        }
    }

    async fn run(db: &MemoryDb, execution_id: &str) -> EnrichmentOutput {
        let storage = MemoryBlobStore::new("b");
        let user = user();
        let inputs = BTreeMap::from([("counter_key".to_string(), "parkrun_count".to_string())]);
        let cx = BoosterContext {
            db,
            storage: &storage,
            user: &user,
            execution_id,
            inputs: &inputs,
        };

        match AutoIncrementBooster.enrich(&cx, &activity()).await.unwrap() {
            StepOutcome::Completed(output) => output,
            StepOutcome::WaitingForInput(_) => panic!("unexpected pause"),
        }
    }

    #[tokio::test]
    async fn increments_across_executions() {
        let db = MemoryDb::new();

        let first = run(&db, "exec-1").await;
        assert_eq!(first.name_suffix.as_deref(), Some(" (#1)"));

        let second = run(&db, "exec-2").await;
        assert_eq!(second.name_suffix.as_deref(), Some(" (#2)"));
    }

    #[tokio::test]
    async fn redelivery_does_not_double_count() {
        let db = MemoryDb::new();

        let first = run(&db, "exec-1").await;
        let redelivered = run(&db, "exec-1").await;

        assert_eq!(first.name_suffix.as_deref(), Some(" (#1)"));
        assert_eq!(redelivered.name_suffix.as_deref(), Some(" (#1)"));

        let counter = db.get_counter("u1", "parkrun_count").await.unwrap().unwrap();
        assert_eq!(counter.count, 1);
    }

    #[tokio::test]
    async fn missing_counter_key_is_fatal() {
        let db = MemoryDb::new();
        let storage = MemoryBlobStore::new("b");
        let user = user();
        let inputs = BTreeMap::new();
        let cx = BoosterContext {
            db: &db,
            storage: &storage,
            user: &user,
            execution_id: "exec-1",
            inputs: &inputs,
        };

        let err = AutoIncrementBooster
            .enrich(&cx, &activity())
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }
}
