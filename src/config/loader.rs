//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::FhirSyncConfig;
use super::secret::secret_string;
use crate::domain::errors::FhirSyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into FhirSyncConfig
/// 4. Applies environment variable overrides (FHIRSYNC_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use fhirsync::config::loader::load_config;
///
/// let config = load_config("fhirsync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<FhirSyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(FhirSyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        FhirSyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text
///
/// Applies the same substitution, overrides and validation as [`load_config`].
pub fn parse_config(contents: &str) -> Result<FhirSyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: FhirSyncConfig = toml::from_str(&contents)
        .map_err(|e| FhirSyncError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        FhirSyncError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| FhirSyncError::Configuration(e.to_string()))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        // Comments are copied untouched
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(FhirSyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the FHIRSYNC_* prefix
///
/// Environment variables follow the pattern: FHIRSYNC_<SECTION>_<KEY>
/// For example: FHIRSYNC_FHIR_BASE_URL, FHIRSYNC_SYNC_LOCATION_ID
fn apply_env_overrides(config: &mut FhirSyncConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("FHIRSYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("FHIRSYNC_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // FHIR server overrides
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_BASE_URL") {
        config.fhir.base_url = val;
    }
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_AUTH_TYPE") {
        config.fhir.auth_type = val;
    }
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_USERNAME") {
        config.fhir.username = Some(val);
    }
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_PASSWORD") {
        config.fhir.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_TOKEN") {
        config.fhir.token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_TLS_VERIFY") {
        config.fhir.tls_verify = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("FHIRSYNC_FHIR_TIMEOUT_SECONDS") {
        if let Ok(timeout) = val.parse() {
            config.fhir.timeout_seconds = timeout;
        }
    }

    // Sync filter overrides
    if let Ok(val) = std::env::var("FHIRSYNC_SYNC_LOCATION_ID") {
        config.sync.location_id = Some(val);
    }
    if let Ok(val) = std::env::var("FHIRSYNC_SYNC_COHORT_TYPE") {
        config.sync.cohort_type = Some(val);
    }
    if let Ok(val) = std::env::var("FHIRSYNC_SYNC_SELECTED_PATIENT_LISTS") {
        config.sync.selected_patient_lists = val
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
    }

    // State overrides
    if let Ok(val) = std::env::var("FHIRSYNC_STATE_DIRECTORY") {
        config.state.directory = val;
    }
    if let Ok(val) = std::env::var("FHIRSYNC_STATE_MONOTONIC_WATERMARKS") {
        config.state.monotonic_watermarks = val.parse().unwrap_or(false);
    }

    // Output overrides
    if let Ok(val) = std::env::var("FHIRSYNC_OUTPUT_DIRECTORY") {
        config.output.directory = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("FHIRSYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("FHIRSYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
