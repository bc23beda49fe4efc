//! State manager for watermark persistence
//!
//! Wraps a [`TimestampStore`] and decides how a processed page moves the
//! stored watermarks.

use crate::adapters::storage::{create_timestamp_store, TimestampStore};
use crate::config::FhirSyncConfig;
use crate::core::state::watermark::{page_maxima, Watermark};
use crate::domain::{Resource, ResourceType, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stored watermarks of a set of types before a page moved them
///
/// `None` marks a type that had no watermark yet.
pub type WatermarkSnapshot = BTreeMap<ResourceType, Option<String>>;

/// State manager for watermark persistence
///
/// By default every processed page overwrites the stored watermark of each
/// type it contained with that page's maximum. With monotonic watermarks
/// enabled a page can only move a watermark forward.
pub struct StateManager {
    /// Watermark storage backend
    store: Arc<dyn TimestampStore + Send + Sync>,

    /// Keep `max(stored, page)` instead of overwriting
    monotonic: bool,

    /// Compute but never persist watermarks
    dry_run: bool,
}

impl StateManager {
    /// Create a new StateManager over a timestamp store
    pub fn new_with_store(store: Arc<dyn TimestampStore + Send + Sync>) -> Self {
        Self {
            store,
            monotonic: false,
            dry_run: false,
        }
    }

    /// Open the configured store with the configured write policy
    ///
    /// # Errors
    ///
    /// Returns an error if the watermark store cannot be opened.
    pub async fn from_config(config: &FhirSyncConfig) -> Result<Self> {
        let store = create_timestamp_store(config).await?;
        Ok(Self::new_with_store(store)
            .with_monotonic(config.state.monotonic_watermarks)
            .with_dry_run(config.application.dry_run))
    }

    /// Only ever move watermarks forward
    pub fn with_monotonic(mut self, monotonic: bool) -> Self {
        self.monotonic = monotonic;
        self
    }

    /// Skip watermark writes
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load the stored watermark for a resource type, as stored
    ///
    /// Returns `Ok(None)` when the type has never been synced, which means
    /// a full fetch with no floor.
    pub async fn load_timestamp(&self, resource_type: ResourceType) -> Result<Option<String>> {
        self.store.get(resource_type).await
    }

    /// All stored watermarks keyed by resource type
    pub async fn get_all_watermarks(&self) -> Result<BTreeMap<ResourceType, String>> {
        self.store.get_all().await
    }

    /// Forget stored watermarks, for one type or for all of them
    pub async fn clear(&self, resource_type: Option<ResourceType>) -> Result<()> {
        match resource_type {
            Some(resource_type) => tracing::info!(resource_type = %resource_type, "Clearing watermark"),
            None => tracing::info!("Clearing all watermarks"),
        }
        self.store.clear(resource_type).await
    }

    /// Checkpoint a fully extracted page
    ///
    /// Computes the per-type maximum `meta.lastUpdated` of `resources` and
    /// writes it in a single store call. Returns the watermarks that were
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read (monotonic mode) or
    /// written.
    pub async fn checkpoint_page(&self, resources: &[Resource]) -> Result<Vec<Watermark>> {
        let mut updates = page_maxima(resources);
        if updates.is_empty() {
            return Ok(updates);
        }

        if self.monotonic {
            let mut advancing = Vec::with_capacity(updates.len());
            for candidate in updates {
                match self.stored_watermark(candidate.resource_type).await? {
                    Some(stored) if !candidate.is_after(&stored) => {
                        tracing::debug!(
                            resource_type = %candidate.resource_type,
                            stored = %stored.formatted(),
                            page = %candidate.formatted(),
                            "Page watermark is not newer than stored watermark, keeping stored"
                        );
                    }
                    _ => advancing.push(candidate),
                }
            }
            updates = advancing;
        }

        if updates.is_empty() {
            return Ok(updates);
        }

        let entries: BTreeMap<ResourceType, String> = updates
            .iter()
            .map(|w| (w.resource_type, w.formatted()))
            .collect();

        if self.dry_run {
            tracing::info!(watermarks = ?entries, "Dry run, not persisting watermarks");
            return Ok(updates);
        }

        tracing::info!(watermarks = ?entries, "Checkpointing page watermarks");
        self.store.set_many(&entries).await?;

        Ok(updates)
    }

    /// Record the stored watermarks of `types` so a later page can be undone
    pub async fn snapshot(
        &self,
        types: impl IntoIterator<Item = ResourceType>,
    ) -> Result<WatermarkSnapshot> {
        let mut snapshot = WatermarkSnapshot::new();
        for resource_type in types {
            let value = self.store.get(resource_type).await?;
            snapshot.insert(resource_type, value);
        }
        Ok(snapshot)
    }

    /// Put the watermarks of a snapshot back, clearing types that had none
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn restore(&self, snapshot: &WatermarkSnapshot) -> Result<()> {
        if self.dry_run || snapshot.is_empty() {
            return Ok(());
        }

        let previous: BTreeMap<ResourceType, String> = snapshot
            .iter()
            .filter_map(|(t, value)| value.clone().map(|v| (*t, v)))
            .collect();

        tracing::warn!(watermarks = ?snapshot, "Restoring watermarks of an unsaved page");
        if !previous.is_empty() {
            self.store.set_many(&previous).await?;
        }
        for (resource_type, value) in snapshot {
            if value.is_none() {
                self.store.clear(Some(*resource_type)).await?;
            }
        }
        Ok(())
    }

    async fn stored_watermark(&self, resource_type: ResourceType) -> Result<Option<Watermark>> {
        let Some(value) = self.store.get(resource_type).await? else {
            return Ok(None);
        };

        match Watermark::parse(resource_type, &value) {
            Ok(watermark) => Ok(Some(watermark)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable stored watermark");
                Ok(None)
            }
        }
    }
}
