//! Incremental download of FHIR resources
//!
//! - [`templates`] - Initial request queue from configured URL lists
//! - [`cursor`] - `_lastUpdated` / `_since` cursors on request URLs
//! - [`summary`] - Count-only request URLs
//! - [`manager`] - Queue ownership and page processing
//! - [`runner`] - Fetch loop over a manager
//! - [`report`] - Result of one pass

pub mod cursor;
pub mod manager;
pub mod report;
pub mod runner;
pub mod summary;
pub mod templates;

pub use manager::{DownloadManager, DownloadRequest, DownloadWorkManager};
pub use report::{SyncError, SyncErrorType, SyncSummary};
pub use runner::{RunnerOptions, SyncRunner};
pub use templates::SyncFilterConfig;
