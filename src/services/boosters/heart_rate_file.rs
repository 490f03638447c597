// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Merges an externally recorded heart-rate stream into the activity.
//!
//! The stream comes from a watch or chest strap whose clock may disagree
//! with the activity's, so the raw samples are handed to the orchestrator
//! for reconciliation rather than applied here. A fresh run pauses until
//! the user uploads the sample file.

use crate::models::{BoosterKind, PendingInput, StandardizedActivity, TimedSample};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterError, EnrichmentOutput, InputRequest, StepOutcome,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

fn parse_samples(json: &[u8]) -> Result<Vec<TimedSample>, BoosterError> {
    let samples: Vec<TimedSample> = serde_json::from_slice(json)
        .map_err(|e| BoosterError::fatal(format!("Sample parse error: {}", e)))?;
    if samples.is_empty() {
        return Err(BoosterError::fatal("Sample stream is empty"));
    }
    if samples.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
        return Err(BoosterError::fatal("Samples are not chronological"));
    }
    Ok(samples)
}

pub struct HeartRateFileBooster;

#[async_trait]
impl Booster for HeartRateFileBooster {
    fn kind(&self) -> BoosterKind {
        BoosterKind::HeartRateFile
    }

    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        // A completed upload from an earlier run of the same activity is
        // consumed directly instead of pausing again.
        let id = crate::services::pending_input::generate_id(
            activity.source,
            &activity.external_id,
            self.kind().as_str(),
        );
        let existing = cx
            .db
            .get_pending_input(&id)
            .await
            .map_err(|e| BoosterError::retryable(format!("Pending input read failed: {}", e)))?;
        if let Some(existing) = existing {
            if existing.status == crate::models::InputStatus::Completed {
                return self.enrich_resume(cx, activity, &existing).await;
            }
        }

        Ok(StepOutcome::WaitingForInput(InputRequest {
            required_fields: vec!["samples_uri".to_string()],
            metadata: BTreeMap::from([(
                "display.prompt".to_string(),
                "Upload the heart-rate recording for this activity".to_string(),
            )]),
            auto_populated: false,
        }))
    }

    /// Resume with either a `samples_uri` pointing at an uploaded JSON
    /// stream or an inline `samples` JSON array.
    async fn enrich_resume(
        &self,
        cx: &BoosterContext<'_>,
        _activity: &StandardizedActivity,
        pending: &PendingInput,
    ) -> Result<StepOutcome, BoosterError> {
        let samples = if let Some(uri) = pending.input_data.get("samples_uri") {
            let body = cx
                .storage
                .read(uri)
                .await
                .map_err(|e| BoosterError::retryable(format!("Sample fetch failed: {}", e)))?;
            parse_samples(&body)?
        } else if let Some(inline) = pending.input_data.get("samples") {
            parse_samples(inline.as_bytes())?
        } else {
            return Err(BoosterError::fatal(
                "Resumed without samples_uri or samples",
            ));
        };

        Ok(StepOutcome::Completed(EnrichmentOutput {
            heart_rate_samples: Some(samples),
            metadata: BTreeMap::from([(
                "heart_rate.source".to_string(),
                "external_file".to_string(),
            )]),
            ..Default::default()
        }))
    }
}
