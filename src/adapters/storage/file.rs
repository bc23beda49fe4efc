//! File-backed watermark store
//!
//! Watermarks of one namespace live in a single JSON document,
//! `<directory>/<namespace>.json`, mapping resource type names to timestamps.
//! Every write replaces the document through a temporary file and a rename so
//! a crash never leaves a half-written file behind.

use super::traits::TimestampStore;
use crate::domain::{FhirSyncError, ResourceType, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Watermark store persisted as a JSON document on disk
pub struct FileTimestampStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileTimestampStore {
    /// Open (or lazily create) the store for `namespace` inside `directory`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// document cannot be parsed.
    pub async fn open(directory: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let directory = directory.as_ref();
        tokio::fs::create_dir_all(directory).await.map_err(|e| {
            FhirSyncError::State(format!(
                "Failed to create state directory {}: {e}",
                directory.display()
            ))
        })?;

        let path = directory.join(format!("{namespace}.json"));
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                FhirSyncError::State(format!(
                    "Corrupt watermark file {}: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(FhirSyncError::State(format!(
                    "Failed to read watermark file {}: {e}",
                    path.display()
                )))
            }
        };

        tracing::debug!(
            path = %path.display(),
            count = entries.len(),
            "Opened watermark store"
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, json).await.map_err(|e| {
            FhirSyncError::State(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            FhirSyncError::State(format!(
                "Failed to replace {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl TimestampStore for FileTimestampStore {
    async fn get(&self, resource_type: ResourceType) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(resource_type.as_str()).cloned())
    }

    async fn set(&self, resource_type: ResourceType, timestamp: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(resource_type.to_string(), timestamp.to_string());
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn set_many(&self, updates: &BTreeMap<ResourceType, String>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        for (resource_type, timestamp) in updates {
            next.insert(resource_type.to_string(), timestamp.clone());
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<ResourceType, String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter_map(|(name, ts)| ResourceType::from_name(name).map(|t| (t, ts.clone())))
            .collect())
    }

    async fn clear(&self, resource_type: Option<ResourceType>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        match resource_type {
            Some(resource_type) => {
                next.remove(resource_type.as_str());
            }
            None => next.clear(),
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}
