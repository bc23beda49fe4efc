//! Domain models and types for fhirsync.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Resource type classification** ([`ResourceType`])
//! - **FHIR page models** ([`FhirResource`], [`Bundle`], [`ListResource`], [`OperationOutcome`], [`Resource`])
//! - **Error types** ([`FhirSyncError`], [`FhirError`])
//! - **Result type alias** ([`Result`])
//!
//! # Parsing pages
//!
//! ```rust
//! use fhirsync::domain::{FhirResource, ResourceType};
//!
//! # fn example() -> fhirsync::domain::Result<()> {
//! let page = FhirResource::from_json(serde_json::json!({
//!     "resourceType": "Bundle",
//!     "type": "searchset",
//!     "entry": [{"resource": {"resourceType": "Patient", "id": "p1"}}]
//! }))?;
//!
//! if let FhirResource::Bundle(bundle) = page {
//!     assert_eq!(bundle.into_resources().len(), 1);
//! }
//! assert_eq!(ResourceType::from_url("Patient?_count=50"), Some(ResourceType::Patient));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod resource;
pub mod resource_type;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{FhirError, FhirSyncError};
pub use resource::{
    Bundle, BundleEntry, BundleLink, FhirResource, ListResource, OperationOutcome, Reference,
    Resource,
};
pub use resource_type::ResourceType;
pub use result::Result;
