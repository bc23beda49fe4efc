//! Result type alias for fhirsync

use super::errors::FhirSyncError;

/// Result type alias for fhirsync operations
///
/// # Examples
///
/// ```
/// use fhirsync::domain::result::Result;
/// use fhirsync::domain::errors::FhirSyncError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(FhirSyncError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, FhirSyncError>;
