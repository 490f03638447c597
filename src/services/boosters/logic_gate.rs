// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conditional gate: halts the pipeline when its condition does not hold.
//!
//! The configured field is read from the activity ("name", "sport",
//! "source", or "metadata.<key>") and compared against a value. A run
//! halted here ends as SKIPPED, not FAILED.

use crate::models::{BoosterKind, StandardizedActivity};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterError, EnrichmentOutput, StepOutcome,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    NotEquals,
    Contains,
}

/// Typed view of this step's configured inputs.
#[derive(Debug)]
struct GateConfig {
    field: String,
    operator: Operator,
    value: String,
    halt_reason: String,
}

impl GateConfig {
    fn parse(inputs: &BTreeMap<String, String>) -> Result<Self, BoosterError> {
        let field = inputs
            .get("field")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| BoosterError::fatal("logic_gate requires field"))?;
        let operator = match inputs.get("operator").map(String::as_str) {
            Some("equals") | None => Operator::Equals,
            Some("not_equals") => Operator::NotEquals,
            Some("contains") => Operator::Contains,
            Some(other) => {
                return Err(BoosterError::fatal(format!(
                    "logic_gate unknown operator: {}",
                    other
                )))
            }
        };
        let value = inputs.get("value").cloned().unwrap_or_default();
        let halt_reason = inputs
            .get("halt_reason")
            .cloned()
            .unwrap_or_else(|| "Gate condition not met".to_string());
        Ok(Self {
            field,
            operator,
            value,
            halt_reason,
        })
    }
}

fn field_value(activity: &StandardizedActivity, field: &str) -> String {
    match field {
        "name" => activity.name.clone(),
        "source" => activity.source.to_string(),
        "sport" => activity
            .sessions
            .first()
            .map(|s| s.sport.clone())
            .unwrap_or_default(),
        other => other
            .strip_prefix("metadata.")
            .and_then(|key| activity.metadata.get(key))
            .cloned()
            .unwrap_or_default(),
    }
}

pub struct LogicGateBooster;

#[async_trait]
impl Booster for LogicGateBooster {
    fn kind(&self) -> BoosterKind {
        BoosterKind::LogicGate
    }

    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        let config = GateConfig::parse(cx.inputs)?;
        let actual = field_value(activity, &config.field);

        let holds = match config.operator {
            Operator::Equals => actual == config.value,
            Operator::NotEquals => actual != config.value,
            Operator::Contains => actual.contains(&config.value),
        };

        if holds {
            return Ok(StepOutcome::Completed(EnrichmentOutput::default()));
        }

        tracing::info!(
            field = %config.field,
            actual = %actual,
            expected = %config.value,
            "Gate condition failed, halting pipeline"
        );
        Ok(StepOutcome::Completed(EnrichmentOutput {
            halt: true,
            halt_reason: Some(config.halt_reason),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::models::{ActivitySource, User};
    use crate::services::storage::MemoryBlobStore;
    use chrono::Utc;

    fn activity() -> StandardizedActivity {
        StandardizedActivity {
            source: ActivitySource::Strava,
            external_id: "e1".to_string(),
            user_id: "u1".to_string(),
            start_time: Utc::now(),
            name: "Saturday parkrun".to_string(),
            description: String::new(),
            tags: vec![],
            sessions: vec![],
            metadata: BTreeMap::from([("race".to_string(), "true".to_string())]),
        }
    }

    async fn gate(inputs: BTreeMap<String, String>) -> EnrichmentOutput {
        let db = MemoryDb::new();
        let storage = MemoryBlobStore::new("b");
        let user = User {
            user_id: "u1".to_string(),
            email: None,
            display_name: "Test".to_string(),
            admin: false,
            created_at: Utc::now(),
        };
        let cx = BoosterContext {
            db: &db,
            storage: &storage,
            user: &user,
            execution_id: "exec-1",
            inputs: &inputs,
        };
        match LogicGateBooster.enrich(&cx, &activity()).await.unwrap() {
            StepOutcome::Completed(output) => output,
            StepOutcome::WaitingForInput(_) => panic!("unexpected pause"),
        }
    }

    #[tokio::test]
    async fn passing_condition_continues() {
        let output = gate(BTreeMap::from([
            ("field".to_string(), "name".to_string()),
            ("operator".to_string(), "contains".to_string()),
            ("value".to_string(), "parkrun".to_string()),
        ]))
        .await;
        assert!(!output.halt);
    }

    #[tokio::test]
    async fn failing_condition_halts_with_reason() {
        let output = gate(BTreeMap::from([
            ("field".to_string(), "metadata.race".to_string()),
            ("value".to_string(), "false".to_string()),
            ("halt_reason".to_string(), "Not a race".to_string()),
        ]))
        .await;
        assert!(output.halt);
        assert_eq!(output.halt_reason.as_deref(), Some("Not a race"));
    }

    #[tokio::test]
    async fn missing_metadata_key_reads_empty() {
        let output = gate(BTreeMap::from([
            ("field".to_string(), "metadata.absent".to_string()),
            ("operator".to_string(), "not_equals".to_string()),
            ("value".to_string(), "anything".to_string()),
        ]))
        .await;
        assert!(!output.halt);
    }
}
