// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitpipe API Server
//!
//! Receives raw activity events, fans them out to user pipelines, runs
//! enrichment boosters over each execution, and publishes enriched
//! activities for delivery.

use fitpipe::{
    config::Config,
    db::{Database, FirestoreDb},
    services::boosters::build_registry,
    services::{BlobStore, Dispatcher, GcsStorage, Orchestrator, PendingInputService, Publisher, TasksService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Fitpipe API");

    // Initialize Firestore database
    let db: Arc<dyn Database> = Arc::new(
        FirestoreDb::new(&config.gcp_project_id)
            .await
            .expect("Failed to connect to Firestore"),
    );

    // Payload storage bucket
    let storage: Arc<dyn BlobStore> = Arc::new(GcsStorage::new(&config.payload_bucket));
    tracing::info!(bucket = %config.payload_bucket, "Payload storage initialized");

    // Cloud Tasks publisher
    let publisher: Arc<dyn Publisher> = Arc::new(TasksService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.service_url,
    ));
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks service initialized"
    );

    // Booster registry and pipeline services
    let registry = Arc::new(build_registry());
    let pending_inputs = Arc::new(PendingInputService::new(
        db.clone(),
        storage.clone(),
        publisher.clone(),
        registry.clone(),
    ));
    let dispatcher = Dispatcher::new(db.clone(), publisher.clone());
    let orchestrator = Orchestrator::new(
        db.clone(),
        storage.clone(),
        publisher.clone(),
        registry.clone(),
        pending_inputs.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        pending_inputs,
        dispatcher,
        orchestrator,
    });

    // Build router
    let app = fitpipe::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitpipe=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
