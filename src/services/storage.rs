// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Object storage for offloaded payloads.
//!
//! Paused and original payloads are too large to carry through queue
//! messages, so they travel by `gs://` reference instead.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;

/// Blob read/write operations behind `gs://bucket/path` URIs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` at `path` within the configured bucket and return the
    /// full `gs://` URI.
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<String>;

    /// Read the blob a `gs://` URI points at.
    async fn read(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Split a `gs://bucket/path` URI into (bucket, object path).
pub fn parse_gs_uri(uri: &str) -> Result<(&str, &str)> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| AppError::Storage(format!("Not a gs:// URI: {}", uri)))?;
    rest.split_once('/')
        .filter(|(bucket, path)| !bucket.is_empty() && !path.is_empty())
        .ok_or_else(|| AppError::Storage(format!("Malformed gs:// URI: {}", uri)))
}

/// Google Cloud Storage client wrapper.
pub struct GcsStorage {
    bucket: String,
}

impl GcsStorage {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
        }
    }

    async fn client(&self) -> Result<google_cloud_storage::client::Storage> {
        google_cloud_storage::client::Storage::builder()
            .build()
            .await
            .map_err(|e| AppError::Storage(format!("GCS client error: {}", e)))
    }

    fn bucket_resource(bucket: &str) -> String {
        format!("projects/_/buckets/{}", bucket)
    }
}

#[async_trait]
impl BlobStore for GcsStorage {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<String> {
        let client = self.client().await?;

        client
            .write_object(
                Self::bucket_resource(&self.bucket),
                path,
                axum::body::Bytes::from(data),
            )
            .send_unbuffered()
            .await
            .map_err(|e| AppError::Storage(format!("GCS write error: {}", e)))?;

        Ok(format!("gs://{}/{}", self.bucket, path))
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let (bucket, path) = parse_gs_uri(uri)?;
        let client = self.client().await?;

        let mut response = client
            .read_object(Self::bucket_resource(bucket), path)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("GCS read error: {}", e)))?;

        let mut data = Vec::new();
        while let Some(chunk) = response.next().await {
            let chunk = chunk.map_err(|e| AppError::Storage(format!("GCS read error: {}", e)))?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}

/// In-memory blob store for tests and local development.
#[derive(Default)]
pub struct MemoryBlobStore {
    bucket: String,
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            blobs: DashMap::new(),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<String> {
        let uri = format!("gs://{}/{}", self.bucket, path);
        self.blobs.insert(uri.clone(), data);
        Ok(uri)
    }

    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(uri)
            .map(|b| b.clone())
            .ok_or_else(|| AppError::Storage(format!("No blob at {}", uri)))
    }
}
