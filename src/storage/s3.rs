// src/storage/s3.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::{path::Path as ObjectPath, Attribute, Attributes, ObjectStore, PutOptions};
use std::sync::Arc;
use tracing::debug;

use super::StorageGateway;

/// S3 or S3-compatible (MinIO) storage for one bucket.
#[derive(Debug)]
pub struct S3Storage {
    bucket: String,
    store: Arc<dyn ObjectStore>,
}

impl S3Storage {
    /// Create S3Storage with custom endpoint for MinIO/S3-compatible storage.
    /// `secure = false` allows plain HTTP endpoints.
    pub fn new_with_endpoint(
        bucket: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        secure: bool,
    ) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint, secure);

        // MinIO needs path-style URLs
        let store = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_endpoint(&endpoint)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_region(region)
            .with_allow_http(!secure)
            .with_virtual_hosted_style_request(false)
            .build()
            .with_context(|| format!("Failed to configure S3 client for bucket '{bucket}'"))?;

        Ok(Self::with_store(bucket, Arc::new(store)))
    }

    /// Wrap an already-built store, e.g. `object_store::memory::InMemory` in tests.
    pub fn with_store(bucket: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.to_string(),
            store,
        }
    }
}

/// Endpoints are configured MinIO-style as `host:port`; add the scheme the
/// S3 client expects.
fn normalize_endpoint(endpoint: &str, secure: bool) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if secure {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    }
}

#[async_trait]
impl StorageGateway for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix_path = ObjectPath::from(prefix);
        let objects: Vec<_> = self
            .store
            .list(Some(&prefix_path))
            .try_collect()
            .await
            .with_context(|| format!("Failed to list s3://{}/{}", self.bucket, prefix))?;

        Ok(objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }

    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let path = ObjectPath::from(key);
        let size = data.len();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, data.into(), opts)
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

        debug!(bucket = %self.bucket, key, size, "Uploaded object");
        Ok(())
    }
}
