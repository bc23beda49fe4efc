//! FHIR server integration
//!
//! [`FhirServer`] is the seam the sync runner fetches pages through;
//! [`HttpFhirClient`] is the HTTP implementation.

pub mod client;
pub mod traits;

pub use client::HttpFhirClient;
pub use traits::FhirServer;

use crate::config::FhirConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the FHIR server client described by the configuration
///
/// # Errors
///
/// Returns a configuration error if the client cannot be built.
pub fn create_fhir_server(config: &FhirConfig) -> Result<Arc<dyn FhirServer>> {
    tracing::debug!(base_url = %config.base_url, auth_type = %config.auth_type, "Creating FHIR client");
    Ok(Arc::new(HttpFhirClient::new(config.clone())?))
}
