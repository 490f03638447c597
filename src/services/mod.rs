// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod boosters;
pub mod dispatcher;
pub mod orchestrator;
pub mod pending_input;
pub mod reconciler;
pub mod storage;
pub mod tasks;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use orchestrator::{Orchestrator, ProcessOutcome};
pub use pending_input::{PendingInputService, PollOutcome};
pub use storage::{BlobStore, GcsStorage, MemoryBlobStore};
pub use tasks::{Publisher, RecordingPublisher, TasksService};
