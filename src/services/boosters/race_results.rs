// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pauses until official race results are published, then stamps them
//! onto the activity. The pending input is flagged auto-populated so the
//! scheduled poller fetches results without human involvement.

use crate::models::{BoosterKind, PendingInput, StandardizedActivity};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterError, EnrichmentOutput, InputRequest, StepOutcome,
};
use crate::services::pending_input::generate_id;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Typed view of this step's configured inputs.
#[derive(Debug)]
struct RaceResultsConfig {
    /// Endpoint returning published results as JSON
    results_url: String,
}

impl RaceResultsConfig {
    fn parse(inputs: &BTreeMap<String, String>) -> Result<Self, BoosterError> {
        let results_url = inputs
            .get("results_url")
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| BoosterError::fatal("race_results requires results_url"))?;
        Ok(Self { results_url })
    }
}

/// Result document served by the results endpoint.
#[derive(Debug, Deserialize)]
struct PublishedResult {
    position: u32,
    finish_time: String,
}

fn apply(input_data: &BTreeMap<String, String>) -> StepOutcome {
    let position = input_data.get("position").cloned().unwrap_or_default();
    let finish_time = input_data.get("finish_time").cloned().unwrap_or_default();

    StepOutcome::Completed(EnrichmentOutput {
        description: Some(format!(
            "Official result: P{} in {}",
            position, finish_time
        )),
        metadata: BTreeMap::from([
            ("result.position".to_string(), position),
            ("result.finish_time".to_string(), finish_time),
        ]),
        tags: vec!["race".to_string()],
        ..Default::default()
    })
}

pub struct RaceResultsBooster;

#[async_trait]
impl Booster for RaceResultsBooster {
    fn kind(&self) -> BoosterKind {
        BoosterKind::RaceResults
    }

    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        let config = RaceResultsConfig::parse(cx.inputs)?;

        let id = generate_id(activity.source, &activity.external_id, self.kind().as_str());
        let existing = cx
            .db
            .get_pending_input(&id)
            .await
            .map_err(|e| BoosterError::retryable(format!("Pending input read failed: {}", e)))?;

        if let Some(existing) = existing {
            if existing.status == crate::models::InputStatus::Completed {
                return Ok(apply(&existing.input_data));
            }
        }

        Ok(StepOutcome::WaitingForInput(InputRequest {
            required_fields: vec!["position".to_string(), "finish_time".to_string()],
            metadata: BTreeMap::from([
                ("results_url".to_string(), config.results_url),
                (
                    "display.prompt".to_string(),
                    "Waiting for official results".to_string(),
                ),
            ]),
            auto_populated: true,
        }))
    }

    async fn enrich_resume(
        &self,
        _cx: &BoosterContext<'_>,
        _activity: &StandardizedActivity,
        pending: &PendingInput,
    ) -> Result<StepOutcome, BoosterError> {
        if pending.input_data.is_empty() {
            return Err(BoosterError::fatal("Resumed without result data"));
        }
        Ok(apply(&pending.input_data))
    }

    /// Fetch results from the endpoint recorded at pause time. A 404 means
    /// results are not published yet.
    async fn poll_external(
        &self,
        pending: &PendingInput,
    ) -> Result<Option<BTreeMap<String, String>>, BoosterError> {
        let Some(results_url) = pending.metadata.get("results_url") else {
            return Err(BoosterError::fatal("Pending input has no results_url"));
        };
        let url = format!("{}?event={}", results_url, pending.external_id);

        let response = reqwest::Client::new()
            .get(&url)
            .send()
            .await
            .map_err(|e| BoosterError::retryable(format!("Results fetch failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(BoosterError::retryable(format!(
                "Results endpoint returned {}",
                response.status()
            )));
        }

        let result: PublishedResult = response
            .json()
            .await
            .map_err(|e| BoosterError::fatal(format!("Results parse error: {}", e)))?;

        Ok(Some(BTreeMap::from([
            ("position".to_string(), result.position.to_string()),
            ("finish_time".to_string(), result.finish_time),
        ])))
    }
}
