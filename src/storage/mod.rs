// src/storage/mod.rs
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

pub mod filesystem;
pub mod s3;

// Re-exports
pub use filesystem::FilesystemStorage;
pub use s3::S3Storage;

/// Object storage scoped to the single bucket selected at process start.
///
/// Keys are bucket-relative and `/`-separated. Failures are returned to the
/// caller, never swallowed.
#[async_trait]
pub trait StorageGateway: Debug + Send + Sync {
    /// Name of the bucket every operation is scoped to.
    fn bucket(&self) -> &str;

    /// Keys of all objects under `prefix`. A prefix with no objects yields an
    /// empty list, not an error.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Store `data` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// Whether anything has been stored under `prefix`.
    async fn has_objects(&self, prefix: &str) -> Result<bool> {
        Ok(!self.list_objects(prefix).await?.is_empty())
    }
}
