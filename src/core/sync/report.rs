//! Sync summary and reporting
//!
//! This module defines structures for tracking and reporting the result of
//! one sync pass.

use crate::domain::{FhirError, FhirSyncError, ResourceType};
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary of a sync pass
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// Requests handed out by the download manager
    pub requests_issued: usize,

    /// Pages fetched and processed without error
    pub pages_processed: usize,

    /// Resources written to the sink
    pub resources_downloaded: usize,

    /// Resources written, per resource type name
    pub resources_by_type: BTreeMap<String, usize>,

    /// Number of requests that failed
    pub failed_requests: usize,

    /// Server-reported totals from the count-only prefetch
    pub expected_totals: BTreeMap<ResourceType, u64>,

    /// Duration of the pass
    pub duration: Duration,

    /// Errors encountered during the pass
    pub errors: Vec<SyncError>,

    /// Pass stopped early because of a shutdown signal
    pub interrupted: bool,

    /// Pass stopped early because `max_pages` was reached
    pub page_limit_reached: bool,
}

impl SyncSummary {
    /// Create a new empty sync summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: SyncError) {
        self.failed_requests += 1;
        self.errors.push(error);
    }

    /// Count resources written for one page
    pub fn record_resources<'a>(&mut self, types: impl IntoIterator<Item = &'a str>) {
        for resource_type in types {
            *self
                .resources_by_type
                .entry(resource_type.to_string())
                .or_insert(0) += 1;
            self.resources_downloaded += 1;
        }
    }

    /// Check if every request succeeded and the queue was drained
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && !self.interrupted
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            requests = self.requests_issued,
            pages = self.pages_processed,
            resources = self.resources_downloaded,
            failed_requests = self.failed_requests,
            interrupted = self.interrupted,
            page_limit_reached = self.page_limit_reached,
            duration_secs = self.duration.as_secs(),
            "Sync completed"
        );

        for (resource_type, count) in &self.resources_by_type {
            tracing::info!(resource_type = %resource_type, count, "Resources downloaded");
        }

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Sync completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    url = error.url.as_deref().unwrap_or(""),
                    "Sync error"
                );
            }
        }
    }
}

/// Type of sync error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorType {
    /// Server answered with an OperationOutcome
    OperationOutcome,
    /// Connection, timeout or server-side HTTP error
    Connection,
    /// Authentication error
    Authentication,
    /// Response could not be understood
    InvalidResponse,
    /// Writing resources failed
    Storage,
    /// Reading or writing watermarks failed
    State,
    /// Configuration error
    Configuration,
    /// Unknown error
    Unknown,
}

impl From<&FhirSyncError> for SyncErrorType {
    fn from(error: &FhirSyncError) -> Self {
        match error {
            FhirSyncError::Fhir(FhirError::OperationOutcome(_)) => Self::OperationOutcome,
            FhirSyncError::Fhir(FhirError::AuthenticationFailed(_)) => Self::Authentication,
            FhirSyncError::Fhir(FhirError::InvalidResponse(_)) => Self::InvalidResponse,
            FhirSyncError::Fhir(FhirError::ClientError { .. }) => Self::InvalidResponse,
            FhirSyncError::Fhir(_) => Self::Connection,
            FhirSyncError::Storage(_) | FhirSyncError::Io(_) => Self::Storage,
            FhirSyncError::State(_) => Self::State,
            FhirSyncError::Configuration(_) | FhirSyncError::UnrecognizedResourceType(_) => {
                Self::Configuration
            }
            _ => Self::Unknown,
        }
    }
}

/// Sync error with the request it belongs to
#[derive(Debug, Clone)]
pub struct SyncError {
    /// Type of error
    pub error_type: SyncErrorType,

    /// Error message
    pub message: String,

    /// Request URL, when the error belongs to one request
    pub url: Option<String>,
}

impl SyncError {
    /// Create a new sync error
    pub fn new(error_type: SyncErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            url: None,
        }
    }

    /// Attach the request URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl From<&FhirSyncError> for SyncError {
    fn from(error: &FhirSyncError) -> Self {
        Self::new(SyncErrorType::from(error), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_summary_creation() {
        let summary = SyncSummary::new();

        assert_eq!(summary.requests_issued, 0);
        assert_eq!(summary.resources_downloaded, 0);
        assert!(summary.errors.is_empty());
        assert!(summary.is_successful());
    }

    #[test]
    fn test_record_resources_counts_per_type() {
        let mut summary = SyncSummary::new();
        summary.record_resources(["Patient", "Observation", "Patient"]);

        assert_eq!(summary.resources_downloaded, 3);
        assert_eq!(summary.resources_by_type["Patient"], 2);
        assert_eq!(summary.resources_by_type["Observation"], 1);
    }

    #[test]
    fn test_add_error_marks_unsuccessful() {
        let mut summary = SyncSummary::new();
        let error = FhirSyncError::Fhir(FhirError::OperationOutcome("bad search".to_string()));

        summary.add_error(SyncError::from(&error).with_url("Patient?bad=1"));

        assert!(!summary.is_successful());
        assert_eq!(summary.failed_requests, 1);
        assert_eq!(summary.errors[0].error_type, SyncErrorType::OperationOutcome);
        assert_eq!(summary.errors[0].url.as_deref(), Some("Patient?bad=1"));
    }

    #[test]
    fn test_error_classification() {
        let cases = [
            (
                FhirSyncError::Fhir(FhirError::ServerError {
                    status: 502,
                    message: "bad gateway".to_string(),
                }),
                SyncErrorType::Connection,
            ),
            (
                FhirSyncError::Storage("disk full".to_string()),
                SyncErrorType::Storage,
            ),
            (
                FhirSyncError::UnrecognizedResourceType("Widget".to_string()),
                SyncErrorType::Configuration,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(SyncErrorType::from(&error), expected);
        }
    }

    #[test]
    fn test_interrupted_is_not_successful() {
        let summary = SyncSummary {
            interrupted: true,
            ..Default::default()
        };
        assert!(!summary.is_successful());
    }
}
