//! Object storage abstraction
//!
//! Provides a unified interface for the bucket holding uploaded papers:
//! - Supabase Storage over its REST API
//! - In-memory store for tests and local runs

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Filename used when the client sends none
const FALLBACK_FILENAME: &str = "upload";

/// Trait for the object storage backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write raw bytes under `path`
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()>;

    /// Public path of an object, relative to the storage origin
    fn public_url(&self, path: &str) -> String;

    /// Bucket name
    fn bucket(&self) -> &str;
}

/// Reduce a client-supplied filename to its final path component
pub fn sanitize_filename(filename: &str) -> &str {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_FILENAME
    } else {
        name
    }
}

/// `/storage/v1/object/public/{bucket}/{path}`, each segment percent-encoded
pub fn public_object_path(bucket: &str, path: &str) -> String {
    format!(
        "/storage/v1/object/public/{}/{}",
        urlencoding::encode(bucket),
        urlencoding::encode(path)
    )
}

/// Generate a fresh object path: `{uuid}_{filename}`
pub fn object_path(filename: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename))
}

/// Supabase Storage client
pub struct SupabaseStorage {
    client: reqwest::Client,
    endpoint: Url,
    service_key: Option<String>,
    bucket: String,
}

impl SupabaseStorage {
    /// Create a new client from configuration
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| AppError::Configuration {
            message: format!("Invalid storage endpoint '{}': {}", config.endpoint, e),
        })?;

        if endpoint.cannot_be_a_base() {
            return Err(AppError::Configuration {
                message: format!("Storage endpoint '{}' cannot be a base URL", config.endpoint),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        if config.service_key.is_none() {
            tracing::warn!("No storage service key configured, uploads will be anonymous");
        }

        Ok(Self {
            client,
            endpoint,
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// `{endpoint}/storage/v1/object/{bucket}/{path}`
    fn object_url(&self, path: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "object", self.bucket.as_str(), path]);
        }
        url
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let url = self.object_url(path);
        let size = bytes.len();

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", content_type.unwrap_or("application/octet-stream"))
            .header("x-upsert", "false")
            .body(bytes);

        if let Some(ref key) = self.service_key {
            request = request
                .header("Authorization", format!("Bearer {}", key))
                .header("apikey", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage {
                message: format!("Upload of '{}' rejected with {}: {}", path, status, body),
            });
        }

        tracing::debug!(bucket = %self.bucket, path = %path, size, "Object stored");

        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        public_object_path(&self.bucket, path)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Stored object held by `MemoryObjectStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// In-memory object store
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a stored object
    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().await.get(path).cloned()
    }

    /// All stored paths
    pub async fn paths(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let mut objects = self.objects.write().await;

        if objects.contains_key(path) {
            return Err(AppError::Storage {
                message: format!("The resource already exists: {}", path),
            });
        }

        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );

        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        public_object_path(&self.bucket, path)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Create an object store based on configuration
pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.provider.as_str() {
        "supabase" => Ok(Arc::new(SupabaseStorage::new(config)?)),
        "memory" => {
            tracing::warn!("Using in-memory object storage, uploads are not persisted");
            Ok(Arc::new(MemoryObjectStore::new(config.bucket.clone())))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown storage provider '{}'", other),
        }),
    }
}
