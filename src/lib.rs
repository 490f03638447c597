// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitpipe: fan activity events out to enrichment pipelines
//!
//! This crate provides the backend API for dispatching fitness activities
//! to user-configured pipelines, running booster chains over them, and
//! pausing executions that need human or external input.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Database;
use services::{Dispatcher, Orchestrator, PendingInputService};
use std::sync::Arc;

/// Shared application state.
///
/// Only what the handlers touch; the storage, publisher, and registry
/// handles live inside the services that use them.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub pending_inputs: Arc<PendingInputService>,
    pub dispatcher: Dispatcher,
    pub orchestrator: Orchestrator,
}
