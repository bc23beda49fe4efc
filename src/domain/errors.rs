//! Domain error types
//!
//! This module defines the error hierarchy for fhirsync.
//! Errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main fhirsync error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum FhirSyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// FHIR server errors
    #[error("FHIR error: {0}")]
    Fhir(#[from] FhirError),

    /// A URL or reference names no known FHIR resource type
    #[error("Unrecognized resource type in '{0}'")]
    UnrecognizedResourceType(String),

    /// Watermark persistence errors
    #[error("State management error: {0}")]
    State(String),

    /// Local resource storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// FHIR server errors
///
/// Errors raised while talking to a FHIR server or interpreting its pages.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum FhirError {
    /// The server answered a search with an OperationOutcome
    #[error("Server returned OperationOutcome: {0}")]
    OperationOutcome(String),

    /// Failed to connect to the FHIR server
    #[error("Failed to connect to FHIR server: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Response body could not be interpreted as a FHIR resource
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

impl FhirError {
    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FhirError::ConnectionFailed(_)
                | FhirError::ServerError { .. }
                | FhirError::RateLimitExceeded(_)
                | FhirError::Timeout(_)
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for FhirSyncError {
    fn from(err: std::io::Error) -> Self {
        FhirSyncError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for FhirSyncError {
    fn from(err: serde_json::Error) -> Self {
        FhirSyncError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for FhirSyncError {
    fn from(err: toml::de::Error) -> Self {
        FhirSyncError::Configuration(format!("TOML parse error: {err}"))
    }
}
