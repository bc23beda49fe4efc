//! NDJSON resource sink
//!
//! Appends each downloaded resource as one JSON line to
//! `<directory>/<resourceType>.ndjson`.

use super::traits::ResourceSink;
use crate::domain::{FhirSyncError, Resource, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// File name stem used for resources whose type is not a plain identifier
const UNKNOWN_TYPE_FILE: &str = "Unknown";

/// Writes resources to per-type NDJSON files
pub struct NdjsonSink {
    directory: PathBuf,
    dry_run: bool,
}

impl NdjsonSink {
    /// Create a sink writing into `directory`
    ///
    /// With `dry_run` set, resources are counted but nothing is written.
    pub async fn new(directory: impl AsRef<Path>, dry_run: bool) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !dry_run {
            tokio::fs::create_dir_all(&directory).await.map_err(|e| {
                FhirSyncError::Storage(format!(
                    "Failed to create output directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        Ok(Self { directory, dry_run })
    }

    fn file_for(&self, resource_type: &str) -> PathBuf {
        let stem = if !resource_type.is_empty()
            && resource_type.chars().all(|c| c.is_ascii_alphanumeric())
        {
            resource_type
        } else {
            UNKNOWN_TYPE_FILE
        };
        self.directory.join(format!("{stem}.ndjson"))
    }
}

#[async_trait]
impl ResourceSink for NdjsonSink {
    async fn store(&self, resources: &[Resource]) -> Result<usize> {
        if resources.is_empty() {
            return Ok(0);
        }

        if self.dry_run {
            tracing::debug!(count = resources.len(), "Dry run, skipping resource write");
            return Ok(resources.len());
        }

        let mut by_file: BTreeMap<PathBuf, Vec<u8>> = BTreeMap::new();
        for resource in resources {
            let buffer = by_file.entry(self.file_for(&resource.resource_type)).or_default();
            serde_json::to_writer(&mut *buffer, &resource.body)?;
            buffer.push(b'\n');
        }

        for (path, buffer) in by_file {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| {
                    FhirSyncError::Storage(format!("Failed to open {}: {e}", path.display()))
                })?;
            file.write_all(&buffer).await.map_err(|e| {
                FhirSyncError::Storage(format!("Failed to write {}: {e}", path.display()))
            })?;
            file.flush().await?;
        }

        Ok(resources.len())
    }
}
