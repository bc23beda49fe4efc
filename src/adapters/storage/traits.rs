//! Storage abstraction traits
//!
//! This module defines the traits that storage adapters must implement:
//! durable per-resource-type watermarks and the destination for downloaded
//! resources.

use crate::domain::{Resource, ResourceType, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Durable key-value storage for last-updated watermarks
///
/// One string value is kept per resource type name. Absence of a value means
/// the next sync of that type is a full fetch.
#[async_trait]
pub trait TimestampStore: Send + Sync {
    /// Load the watermark for a resource type
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(timestamp))` if stored, `Ok(None)` otherwise.
    async fn get(&self, resource_type: ResourceType) -> Result<Option<String>>;

    /// Store the watermark for a resource type
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    async fn set(&self, resource_type: ResourceType, timestamp: &str) -> Result<()>;

    /// Store several watermarks as one write
    ///
    /// Backends that can persist atomically should override this; the
    /// default stores each entry in turn.
    async fn set_many(&self, entries: &BTreeMap<ResourceType, String>) -> Result<()> {
        for (resource_type, timestamp) in entries {
            self.set(*resource_type, timestamp).await?;
        }
        Ok(())
    }

    /// Every stored watermark
    async fn get_all(&self) -> Result<BTreeMap<ResourceType, String>>;

    /// Remove one watermark, or all of them when `resource_type` is `None`
    async fn clear(&self, resource_type: Option<ResourceType>) -> Result<()>;
}

/// Destination for resources yielded by the sync
#[async_trait]
pub trait ResourceSink: Send + Sync {
    /// Persist a page worth of resources
    ///
    /// # Returns
    ///
    /// Returns the number of resources written.
    async fn store(&self, resources: &[Resource]) -> Result<usize>;
}
