//! Logging and observability
//!
//! Structured logging with:
//! - Console output with configurable log level
//! - JSON-formatted local log files with rotation
//!
//! # Example
//!
//! ```no_run
//! use fhirsync::logging::init_logging;
//! use fhirsync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a sync pass
///
/// # Example
///
/// ```no_run
/// use fhirsync::log_sync_start;
///
/// log_sync_start!("http://localhost:8080/openmrs/ws/fhir2/R4/");
/// ```
#[macro_export]
macro_rules! log_sync_start {
    ($base_url:expr) => {
        tracing::info!(base_url = %$base_url, "Starting sync");
    };
}

/// Log the completion of a sync pass
///
/// # Example
///
/// ```no_run
/// use fhirsync::log_sync_complete;
/// use std::time::Duration;
///
/// log_sync_complete!(42, Duration::from_secs(10));
/// ```
#[macro_export]
macro_rules! log_sync_complete {
    ($count:expr, $duration:expr) => {
        tracing::info!(
            resources = $count,
            duration_ms = $duration.as_millis() as u64,
            "Sync finished"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use fhirsync::log_error_with_context;
/// use fhirsync::domain::FhirSyncError;
///
/// let error = FhirSyncError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use fhirsync::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = $reason,
            "Retrying request"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::FhirSyncError;
    use std::time::Duration;

    #[test]
    fn test_macros_expand_without_subscriber() {
        let error = FhirSyncError::Storage("disk full".to_string());

        crate::log_sync_start!("http://localhost/fhir/");
        crate::log_sync_complete!(3usize, Duration::from_millis(250));
        crate::log_error_with_context!(&error, "Writing page");
        crate::log_retry_attempt!(1usize, 3usize, "timeout");
    }
}
