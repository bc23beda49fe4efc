//! Configuration management for fhirsync.
//!
//! # Overview
//!
//! fhirsync uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `FHIRSYNC_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`FhirConfig`] - FHIR server connection, authentication and retries
//! - [`SyncConfig`] - Sync URL templates and Group/patient-list filters
//! - [`StateConfig`] - Watermark persistence
//! - [`OutputConfig`] - Where downloaded resources go
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [fhir]
//! base_url = "https://demo.openmrs.org/openmrs/ws/fhir2/R4"
//! username = "admin"
//! password = "${FHIRSYNC_PASSWORD}"
//!
//! [sync]
//! first_sync_urls = "Patient?_count=100"
//! recurring_sync_urls = "Patient?_count=50,Encounter?_count=50,Observation?_count=50"
//! location_filter_enabled = true
//! location_id = "8d6c993e-c2cc-11de-8d13-0010c6dffd0f"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, Environment, FhirConfig, FhirSyncConfig, LoggingConfig, OutputConfig,
    RetryConfig, StateConfig, SyncConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
