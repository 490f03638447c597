// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Appends a plain-text workout summary to the activity description.

use crate::models::{BoosterKind, StandardizedActivity};
use crate::services::boosters::{
    Booster, BoosterContext, BoosterError, EnrichmentOutput, StepOutcome,
};
use async_trait::async_trait;

/// Typed view of this step's configured inputs.
#[derive(Debug, Default)]
struct SummaryConfig {
    /// Include strength sets in the summary
    include_sets: bool,
}

impl SummaryConfig {
    fn parse(inputs: &std::collections::BTreeMap<String, String>) -> Self {
        Self {
            include_sets: inputs
                .get("include_sets")
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }
}

pub struct WorkoutSummaryBooster;

#[async_trait]
impl Booster for WorkoutSummaryBooster {
    fn kind(&self) -> BoosterKind {
        BoosterKind::WorkoutSummary
    }

    async fn enrich(
        &self,
        cx: &BoosterContext<'_>,
        activity: &StandardizedActivity,
    ) -> Result<StepOutcome, BoosterError> {
        let config = SummaryConfig::parse(cx.inputs);

        let total_seconds = activity.total_duration_seconds();
        let mut lines = vec![format!(
            "Workout summary: {} session(s), {} min total",
            activity.sessions.len(),
            total_seconds / 60
        )];

        for session in &activity.sessions {
            if !session.sport.is_empty() {
                lines.push(format!(
                    "- {}: {} min",
                    session.sport,
                    session.total_elapsed_seconds / 60
                ));
            }

            if config.include_sets {
                for set in &session.strength_sets {
                    let weight = set
                        .weight_kg
                        .map(|w| format!(" @ {:.1} kg", w))
                        .unwrap_or_default();
                    let reps = set.reps.map(|r| format!(" x{}", r)).unwrap_or_default();
                    lines.push(format!("  {}{}{}", set.exercise, reps, weight));
                }
            }
        }

        Ok(StepOutcome::Completed(EnrichmentOutput {
            description: Some(lines.join("\n")),
            ..Default::default()
        }))
    }
}
