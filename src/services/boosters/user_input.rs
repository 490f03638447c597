// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pauses the pipeline until a human fills in the configured fields.
//!
//! On a fresh run, an already-completed pending input (left over from a
//! previous run of the same activity) is consumed directly instead of
//! pausing again.

use crate::models::{BoosterKind, InputStatus, PendingInput, StandardizedActivity};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterError, EnrichmentOutput, InputRequest, StepOutcome,
};
use crate::services::pending_input::generate_id;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Typed view of this step's configured inputs.
#[derive(Debug)]
struct UserInputConfig {
    fields: Vec<String>,
    prompt: String,
}

impl UserInputConfig {
    fn parse(inputs: &BTreeMap<String, String>) -> Result<Self, BoosterError> {
        let fields: Vec<String> = inputs
            .get("fields")
            .map(|v| {
                v.split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if fields.is_empty() {
            return Err(BoosterError::fatal("user_input requires fields"));
        }
        let prompt = inputs
            .get("prompt")
            .cloned()
            .unwrap_or_else(|| "Additional details needed".to_string());
        Ok(Self { fields, prompt })
    }
}

fn apply(input_data: &BTreeMap<String, String>) -> EnrichmentOutput {
    let mut output = EnrichmentOutput::default();
    for (field, value) in input_data {
        if field == "notes" {
            output.description = Some(value.clone());
        }
        output.metadata.insert(format!("input.{}", field), value.clone());
    }
    output
}

pub struct UserInputBooster;

#[async_trait]
impl Booster for UserInputBooster {
    fn kind(&self) -> BoosterKind {
        BoosterKind::UserInput
    }

    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        let config = UserInputConfig::parse(cx.inputs)?;

        let id = generate_id(activity.source, &activity.external_id, self.kind().as_str());
        let existing = cx
            .db
            .get_pending_input(&id)
            .await
            .map_err(|e| BoosterError::retryable(format!("Pending input read failed: {}", e)))?;

        if let Some(existing) = existing {
            if existing.status == InputStatus::Completed {
                return Ok(StepOutcome::Completed(apply(&existing.input_data)));
            }
        }

        Ok(StepOutcome::WaitingForInput(InputRequest {
            required_fields: config.fields,
            metadata: BTreeMap::from([("display.prompt".to_string(), config.prompt)]),
            auto_populated: false,
        }))
    }

    async fn enrich_resume(
        &self,
        _cx: &BoosterContext<'_>,
        _activity: &StandardizedActivity,
        pending: &PendingInput,
    ) -> Result<StepOutcome, BoosterError> {
        if pending.input_data.is_empty() {
            return Err(BoosterError::fatal("Resumed without input data"));
        }
        Ok(StepOutcome::Completed(apply(&pending.input_data)))
    }
}
