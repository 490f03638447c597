// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod payload;
pub mod pending_input;
pub mod pipeline;
pub mod run;
pub mod user;

pub use activity::{
    ActivitySource, Lap, Record, Session, StandardizedActivity, StrengthSet, TimedSample,
};
pub use payload::{ActivityPayload, EnrichedActivityEvent};
pub use pending_input::{InputStatus, PendingInput};
pub use pipeline::{BoosterConfig, BoosterKind, Destination, PipelineConfig};
pub use run::{
    BoosterExecution, Counter, DestinationOutcome, PipelineRun, RunStatus, StepStatus,
    UploadedActivityRecord,
};
pub use user::User;
