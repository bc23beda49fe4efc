//! In-memory storage backends, used by tests and `plan`

use super::traits::{ResourceSink, TimestampStore};
use crate::domain::{Resource, ResourceType, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Watermark store held in process memory
#[derive(Default)]
pub struct MemoryTimestampStore {
    entries: Mutex<BTreeMap<ResourceType, String>>,
}

impl MemoryTimestampStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`
    pub fn with_entries(entries: BTreeMap<ResourceType, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl TimestampStore for MemoryTimestampStore {
    async fn get(&self, resource_type: ResourceType) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(&resource_type).cloned())
    }

    async fn set(&self, resource_type: ResourceType, timestamp: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(resource_type, timestamp.to_string());
        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<ResourceType, String>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn clear(&self, resource_type: Option<ResourceType>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        match resource_type {
            Some(resource_type) => {
                entries.remove(&resource_type);
            }
            None => entries.clear(),
        }
        Ok(())
    }
}

/// Resource sink that keeps everything it receives
#[derive(Default)]
pub struct MemoryResourceSink {
    resources: Mutex<Vec<Resource>>,
}

impl MemoryResourceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored resources, in arrival order
    pub async fn resources(&self) -> Vec<Resource> {
        self.resources.lock().await.clone()
    }
}

#[async_trait]
impl ResourceSink for MemoryResourceSink {
    async fn store(&self, resources: &[Resource]) -> Result<usize> {
        self.resources.lock().await.extend_from_slice(resources);
        Ok(resources.len())
    }
}
