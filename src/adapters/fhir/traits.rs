//! FHIR server trait definition

use crate::domain::{FhirResource, Result};
use async_trait::async_trait;

/// A FHIR server that pages can be fetched from
///
/// The sync runner only ever issues GETs for URLs produced by the download
/// manager: relative search URLs, `$everything` operations and absolute
/// `next` links handed out by the server itself.
#[async_trait]
pub trait FhirServer: Send + Sync {
    /// Fetch one page
    ///
    /// # Errors
    ///
    /// Returns `FhirError::OperationOutcome` when the server rejects the
    /// request with an OperationOutcome, and other `FhirError` variants for
    /// transport or HTTP failures.
    async fn fetch(&self, url: &str) -> Result<FhirResource>;

    /// Base URL relative request URLs are resolved against
    fn base_url(&self) -> &str;
}
