//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the fhirsync configuration file, including the sync URL templates.

use crate::config::load_config;
use crate::core::sync::templates::{build_templates, SyncFilterConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading runs schema validation as well
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let templates = match build_templates(
            &config.sync.first_sync_urls,
            &config.sync.recurring_sync_urls,
            &SyncFilterConfig::from(&config.sync),
        ) {
            Ok(t) => t,
            Err(e) => {
                println!("❌ Sync URL validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  FHIR Server: {}", config.fhir.base_url);
        println!("  Auth Type: {}", config.fhir.auth_type);
        println!("  State Store: {}/{}.json", config.state.directory, config.state.namespace);
        println!("  Monotonic Watermarks: {}", config.state.monotonic_watermarks);
        println!("  Output Directory: {}", config.output.directory);
        println!("  Queries ({}):", templates.len());
        for url in &templates {
            println!("    - {url}");
        }
        println!();

        Ok(0)
    }
}
