//! Core business logic for fhirsync.
//!
//! # Modules
//!
//! - [`state`] - Watermark state for incremental syncs
//! - [`sync`] - Request queue, cursors, page processing and the sync loop
//!
//! # Sync Workflow
//!
//! 1. **Template**: Build one query per resource type from configuration
//! 2. **Poll**: Take the next URL and affix the stored watermark for its type
//! 3. **Fetch**: GET the page from the FHIR server
//! 4. **Process**: Follow `next` links, expand patient lists, yield resources
//! 5. **Checkpoint**: Persist per-type watermarks once a page is extracted
//! 6. **Report**: Generate a sync summary
//!
//! # Example
//!
//! ```rust,no_run
//! use fhirsync::adapters::fhir::HttpFhirClient;
//! use fhirsync::adapters::storage::{create_resource_sink, create_timestamp_store};
//! use fhirsync::config::load_config;
//! use fhirsync::core::state::StateManager;
//! use fhirsync::core::sync::{DownloadManager, SyncRunner};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhirsync.toml")?;
//!
//! let state = Arc::new(StateManager::new_with_store(create_timestamp_store(&config).await?));
//! let mut manager = DownloadManager::from_config(&config.sync, state)?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let runner = SyncRunner::new(
//!     Arc::new(HttpFhirClient::new(config.fhir.clone())?),
//!     create_resource_sink(&config).await?,
//!     shutdown_rx,
//! );
//!
//! let summary = runner.run(&mut manager).await?;
//! println!("Downloaded: {}", summary.resources_downloaded);
//! # Ok(())
//! # }
//! ```

pub mod state;
pub mod sync;
