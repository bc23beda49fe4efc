// fhirsync - Incremental FHIR download tool
// Copyright (c) 2025 fhirsync Contributors
// Licensed under the MIT License

//! # fhirsync - Incremental FHIR download
//!
//! fhirsync pulls resources from a FHIR server page by page and remembers,
//! per resource type, the newest `meta.lastUpdated` it has seen, so later
//! runs only ask for what changed.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Templating** one search query per resource type from configured URL lists,
//!   with location, cohort and patient-list filters spliced in
//! - **Cursoring** each query with `_lastUpdated=gt<ts>` (or `_since=<ts>` for
//!   `$everything`) from the stored watermark
//! - **Paginating** through `next` links and expanding patient lists into
//!   per-patient `$everything` fetches
//! - **Checkpointing** per-type watermarks once a page is fully extracted
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (request queue, cursors, sync loop, state)
//! - [`adapters`] - External integrations (FHIR server, local storage)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhirsync::adapters::storage::MemoryTimestampStore;
//! use fhirsync::core::state::StateManager;
//! use fhirsync::core::sync::{DownloadManager, DownloadWorkManager};
//! use fhirsync::domain::FhirResource;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = Arc::new(StateManager::new_with_store(Arc::new(MemoryTimestampStore::new())));
//! let mut manager = DownloadManager::new(
//!     vec!["Patient?_count=50".to_string(), "Observation?_count=50".to_string()],
//!     state,
//! );
//!
//! while let Some(request) = manager.next_request().await? {
//!     let body: serde_json::Value = reqwest::get(&request.url).await?.json().await?;
//!     let resources = manager.process_response(FhirResource::from_json(body)?).await?;
//!     println!("{} yielded {} resources", request.url, resources.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! fhirsync uses the [`domain::FhirSyncError`] type for all errors. Server
//! failures, including OperationOutcome responses, arrive as
//! [`domain::FhirError`]:
//!
//! ```rust,no_run
//! use fhirsync::domain::{FhirError, FhirSyncError};
//!
//! fn describe(error: &FhirSyncError) -> String {
//!     match error {
//!         FhirSyncError::Fhir(FhirError::OperationOutcome(diagnostics)) => {
//!             format!("server rejected the search: {diagnostics}")
//!         }
//!         other => other.to_string(),
//!     }
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
