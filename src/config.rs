//! Application configuration loaded from environment variables.
//!
//! Secrets arrive as environment variables via Cloud Run secret bindings,
//! so there is no separate secret-fetch path.

use std::env;

/// Queue feeding the fan-out dispatcher with raw activity events.
pub const RAW_QUEUE_NAME: &str = "raw-activity";
/// Queue feeding the orchestrator with per-pipeline events.
pub const PIPELINE_QUEUE_NAME: &str = "pipeline-activity";
/// Queue carrying enriched events toward destination dispatch.
pub const ENRICHED_QUEUE_NAME: &str = "enriched-activity";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region for Cloud Tasks queues
    pub gcp_region: String,
    /// Public URL of this service (Cloud Tasks target)
    pub service_url: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCS bucket for offloaded payloads
    pub payload_bucket: String,
    /// Server port
    pub port: u16,
    /// Redeliveries tolerated before a retryable step error is given up on
    pub max_task_retries: u32,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            service_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            payload_bucket: "test-payloads".to_string(),
            port: 8080,
            max_task_retries: 5,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            service_url: env::var("SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            payload_bucket: env::var("PAYLOAD_BUCKET")
                .map_err(|_| ConfigError::Missing("PAYLOAD_BUCKET"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            max_task_retries: env::var("MAX_TASK_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
