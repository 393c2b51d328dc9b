// src/storage/filesystem.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use super::StorageGateway;

/// Local landing zone: each bucket is a directory under `base_dir`, each key
/// a file path relative to it. Content types are not recorded.
#[derive(Debug)]
pub struct FilesystemStorage {
    bucket: String,
    root: PathBuf,
}

impl FilesystemStorage {
    pub fn new(base_dir: &str, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            root: PathBuf::from(base_dir).join(bucket),
        }
    }

    /// Directory the bucket's objects are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

fn collect_files(dir: &Path, root: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, root, keys)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
    }
    Ok(())
}

#[async_trait]
impl StorageGateway for FilesystemStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.key_path(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        collect_files(&dir, &self.root, &mut keys)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        keys.sort();
        Ok(keys)
    }

    async fn put_object(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.key_path(key);

        // Create parent directories
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
