//! Configuration schema types
//!
//! This module defines the configuration structure for fhirsync.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main fhirsync configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirSyncConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// FHIR server connection
    pub fhir: FhirConfig,

    /// Sync URL templates and filters
    pub sync: SyncConfig,

    /// Watermark persistence
    #[serde(default)]
    pub state: StateConfig,

    /// Where downloaded resources are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FhirSyncConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.fhir.validate(&self.environment)?;
        self.sync.validate()?;
        self.state.validate()?;
        self.output.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (fetch and process, but write neither resources nor watermarks)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// FHIR server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    /// Base URL of the FHIR endpoint, e.g. `https://host/openmrs/ws/fhir2/R4`
    pub base_url: String,

    /// Authentication type (none, basic, bearer)
    #[serde(default = "default_auth_type")]
    pub auth_type: String,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Bearer token for token authentication
    #[serde(default)]
    pub token: Option<SecretString>,

    /// TLS certificate verification enabled
    ///
    /// Must stay `true` in production (enforced by validation).
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl FhirConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.base_url.is_empty() {
            return Err("fhir.base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("fhir.base_url must start with http:// or https://".to_string());
        }

        let valid_auth_types = ["none", "basic", "bearer"];
        if !valid_auth_types.contains(&self.auth_type.as_str()) {
            return Err(format!(
                "Invalid auth_type '{}'. Must be one of: {}",
                self.auth_type,
                valid_auth_types.join(", ")
            ));
        }

        if self.auth_type == "basic" {
            if self.username.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
                return Err("fhir.username cannot be empty when auth_type is 'basic'".to_string());
            }

            if self
                .password
                .as_ref()
                .map(|s| s.expose_secret().is_empty())
                .unwrap_or(true)
            {
                return Err("fhir.password cannot be empty when auth_type is 'basic'".to_string());
            }
        }

        if self.auth_type == "bearer"
            && self
                .token
                .as_ref()
                .map(|s| s.expose_secret().is_empty())
                .unwrap_or(true)
        {
            return Err("fhir.token cannot be empty when auth_type is 'bearer'".to_string());
        }

        if *environment == Environment::Production && !self.tls_verify {
            return Err(
                "TLS certificate verification cannot be disabled in production environments"
                    .to_string(),
            );
        }

        if self.timeout_seconds == 0 {
            return Err("fhir.timeout_seconds must be > 0".to_string());
        }

        if self.retry.max_retries == 0 || self.retry.max_retries > 10 {
            return Err(format!(
                "fhir.retry.max_retries must be between 1 and 10, got {}",
                self.retry.max_retries
            ));
        }

        Ok(())
    }
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/openmrs/ws/fhir2/R4".to_string(),
            auth_type: default_auth_type(),
            username: None,
            password: None,
            token: None,
            tls_verify: true,
            timeout_seconds: default_timeout_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

/// Sync URL templates and filters
///
/// URL lists are comma-separated, relative to `fhir.base_url`, and each must
/// start with a FHIR resource type, e.g. `"Patient?_count=50,Encounter?_count=50"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// URLs used on the first sync; they win over recurring URLs of the same type
    #[serde(default)]
    pub first_sync_urls: String,

    /// URLs used on every sync
    #[serde(default)]
    pub recurring_sync_urls: String,

    /// Restrict Group queries to `location_id`
    #[serde(default)]
    pub location_filter_enabled: bool,

    /// Location used by the location filter
    #[serde(default)]
    pub location_id: Option<String>,

    /// Restrict Group queries to `cohort_type`
    #[serde(default = "default_true")]
    pub cohort_filter_enabled: bool,

    /// Cohort/list type used by the cohort filter
    #[serde(default)]
    pub cohort_type: Option<String>,

    /// Substitute selected patient lists into `_has:Group:member:id=`
    #[serde(default = "default_true")]
    pub patient_list_filter_enabled: bool,

    /// Selected patient list (Group) ids
    #[serde(default)]
    pub selected_patient_lists: Vec<String>,

    /// Keep draining the queue after a request fails
    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    /// Fetch `_summary=count` totals before the sync starts
    #[serde(default)]
    pub fetch_summary_counts: bool,

    /// Upper bound on pages fetched in one pass (unbounded if unset)
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl SyncConfig {
    fn validate(&self) -> Result<(), String> {
        if self.first_sync_urls.trim().is_empty() && self.recurring_sync_urls.trim().is_empty() {
            return Err(
                "sync.first_sync_urls and sync.recurring_sync_urls cannot both be empty"
                    .to_string(),
            );
        }

        if self.location_filter_enabled
            && self
                .location_id
                .as_ref()
                .map(|id| id.trim().is_empty())
                .unwrap_or(true)
        {
            return Err(
                "sync.location_id is required when location_filter_enabled is true".to_string(),
            );
        }

        if self.max_pages == Some(0) {
            return Err("sync.max_pages must be > 0 when set".to_string());
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            first_sync_urls: String::new(),
            recurring_sync_urls: String::new(),
            location_filter_enabled: false,
            location_id: None,
            cohort_filter_enabled: true,
            cohort_type: None,
            patient_list_filter_enabled: true,
            selected_patient_lists: Vec::new(),
            continue_on_error: true,
            fetch_summary_counts: false,
            max_pages: None,
        }
    }
}

/// Watermark persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding watermark files
    #[serde(default = "default_state_directory")]
    pub directory: String,

    /// Key namespace; one watermark document per namespace
    #[serde(default = "default_state_namespace")]
    pub namespace: String,

    /// Never move a watermark backwards (`max(stored, page)` instead of overwrite)
    #[serde(default)]
    pub monotonic_watermarks: bool,
}

impl StateConfig {
    fn validate(&self) -> Result<(), String> {
        if self.directory.trim().is_empty() {
            return Err("state.directory cannot be empty".to_string());
        }

        if self.namespace.is_empty()
            || !self
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(format!(
                "state.namespace '{}' must be non-empty and contain only [A-Za-z0-9_.-]",
                self.namespace
            ));
        }

        Ok(())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: default_state_directory(),
            namespace: default_state_namespace(),
            monotonic_watermarks: false,
        }
    }
}

/// Output configuration for downloaded resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one NDJSON file per resource type
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl OutputConfig {
    fn validate(&self) -> Result<(), String> {
        if self.directory.trim().is_empty() {
            return Err("output.directory cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_auth_type() -> String {
    "basic".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_state_directory() -> String {
    ".fhirsync/state".to_string()
}

fn default_state_namespace() -> String {
    "last_updated".to_string()
}

fn default_output_directory() -> String {
    ".fhirsync/resources".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}
