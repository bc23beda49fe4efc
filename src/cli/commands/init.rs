//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "fhirsync.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing fhirsync configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your server and sync URLs", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - Set FHIRSYNC_FHIR_USERNAME and FHIRSYNC_FHIR_PASSWORD");
                println!("  3. Validate configuration: fhirsync validate-config");
                println!("  4. Preview the queries: fhirsync plan");
                println!("  5. Run a sync: fhirsync sync");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# fhirsync configuration

[application]
log_level = "info"
dry_run = false

[fhir]
base_url = "http://localhost:8080/openmrs/ws/fhir2/R4"
auth_type = "basic"
username = "${FHIRSYNC_FHIR_USERNAME}"
password = "${FHIRSYNC_FHIR_PASSWORD}"

[sync]
first_sync_urls = "Patient?_count=100"
recurring_sync_urls = "Patient?_count=50,Encounter?_count=50,Observation?_count=50"

[state]
directory = ".fhirsync/state"

[output]
directory = ".fhirsync/resources"

[logging]
local_enabled = true
local_path = "./logs"
"#
        .to_string()
    }

    /// Generate configuration with every option documented
    fn generate_config_with_examples() -> String {
        r#"# fhirsync configuration
# Incremental FHIR download with per-resource-type watermarks

# development | staging | production
environment = "development"

[application]
# trace | debug | info | warn | error
log_level = "info"

# Fetch and process pages without writing resources or watermarks
dry_run = false

[fhir]
base_url = "http://localhost:8080/openmrs/ws/fhir2/R4"

# none | basic | bearer
auth_type = "basic"
username = "${FHIRSYNC_FHIR_USERNAME}"
password = "${FHIRSYNC_FHIR_PASSWORD}"
# token = "${FHIRSYNC_FHIR_TOKEN}"

# TLS certificate verification (cannot be disabled in production)
tls_verify = true

# Per-request timeout
timeout_seconds = 60

[fhir.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

[sync]
# Comma separated queries. For each resource type the first URL wins,
# first-sync URLs ahead of recurring ones.
first_sync_urls = "Patient?_count=100"
recurring_sync_urls = "Patient?_count=50,Encounter?_count=50,Observation?_count=50,Group?_count=50,List?_has:Group:member:id="

# Append location=<id> to Group queries
location_filter_enabled = false
# location_id = "8d6c993e-c2cc-11de-8d13-0010c6dffd0f"

# Append list-type=<cohort_type> to Group queries
cohort_filter_enabled = true
# cohort_type = "e71857cb-33af-4f2c-86ab-7223bcfd37ad"

# Substitute these list ids after _has:Group:member:id=
# (the parameter is dropped when the list is empty)
patient_list_filter_enabled = true
selected_patient_lists = []

# Keep draining the queue after a request fails
continue_on_error = true

# Ask for _summary=count totals before downloading
fetch_summary_counts = false

# Upper bound on requests per pass
# max_pages = 1000

[state]
directory = ".fhirsync/state"
namespace = "last_updated"

# Never move a watermark backwards
monotonic_watermarks = false

[output]
# One <ResourceType>.ndjson file per type
directory = ".fhirsync/resources"

[logging]
local_enabled = true
local_path = "./logs"

# daily | hourly | never
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn with_credentials<T>(f: impl FnOnce() -> T) -> T {
        std::env::set_var("FHIRSYNC_FHIR_USERNAME", "admin");
        std::env::set_var("FHIRSYNC_FHIR_PASSWORD", "Admin123");
        f()
    }

    #[test]
    fn test_generated_configs_parse() {
        with_credentials(|| {
            let minimal = parse_config(&InitArgs::generate_minimal_config()).unwrap();
            assert_eq!(minimal.fhir.auth_type, "basic");

            let full = parse_config(&InitArgs::generate_config_with_examples()).unwrap();
            assert_eq!(full.fhir.retry.max_retries, 3);
            assert!(full.sync.recurring_sync_urls.contains("_has:Group:member:id="));
        });
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("fhirsync.toml");
        std::fs::write(&output, "existing").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "existing");
    }

    #[tokio::test]
    async fn test_init_writes_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("fhirsync.toml");

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            with_examples: true,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 0);
        assert!(std::fs::read_to_string(&output)
            .unwrap()
            .contains("[fhir.retry]"));
    }
}
