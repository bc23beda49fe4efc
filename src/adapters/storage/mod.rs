//! Local storage layer
//!
//! Trait-based abstraction over the two things fhirsync persists locally:
//! per-resource-type watermarks ([`TimestampStore`]) and downloaded
//! resources ([`ResourceSink`]).

pub mod file;
pub mod memory;
pub mod ndjson;
pub mod traits;

pub use file::FileTimestampStore;
pub use memory::{MemoryResourceSink, MemoryTimestampStore};
pub use ndjson::NdjsonSink;
pub use traits::{ResourceSink, TimestampStore};

use crate::config::FhirSyncConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the watermark store described by the configuration
///
/// # Errors
///
/// Returns an error if the state directory cannot be prepared.
pub async fn create_timestamp_store(
    config: &FhirSyncConfig,
) -> Result<Arc<dyn TimestampStore + Send + Sync>> {
    tracing::debug!(
        directory = %config.state.directory,
        namespace = %config.state.namespace,
        "Creating file watermark store"
    );
    let store = FileTimestampStore::open(&config.state.directory, &config.state.namespace).await?;
    Ok(Arc::new(store) as Arc<dyn TimestampStore + Send + Sync>)
}

/// Create the resource sink described by the configuration
pub async fn create_resource_sink(
    config: &FhirSyncConfig,
) -> Result<Arc<dyn ResourceSink + Send + Sync>> {
    let sink = NdjsonSink::new(&config.output.directory, config.application.dry_run).await?;
    Ok(Arc::new(sink) as Arc<dyn ResourceSink + Send + Sync>)
}
