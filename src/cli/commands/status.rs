//! Status command implementation
//!
//! This module implements the `status` command for displaying the stored
//! watermark of every synced resource type.

use crate::config::load_config;
use crate::core::state::StateManager;
use crate::domain::ResourceType;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Only show this resource type
    #[arg(long, value_name = "TYPE")]
    pub resource_type: Option<ResourceType>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking sync status");

        println!("📊 Sync Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let state = match StateManager::from_config(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to open watermark store");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let watermarks = match state.get_all_watermarks().await {
            Ok(w) => w,
            Err(e) => {
                println!("❌ Failed to load watermarks");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        println!("Store: {}/{}.json", config.state.directory, config.state.namespace);
        println!();

        if watermarks.is_empty() {
            println!("No sync history found.");
            println!("Run 'fhirsync sync' to start downloading data.");
            return Ok(0);
        }

        let shown: Vec<_> = watermarks
            .iter()
            .filter(|(resource_type, _)| {
                self.resource_type
                    .map_or(true, |wanted| wanted == **resource_type)
            })
            .collect();

        if shown.is_empty() {
            println!("No watermark stored for the requested resource type.");
            return Ok(0);
        }

        println!("Found {} watermark(s):", shown.len());
        println!();
        println!("{:<28} {:<30}", "Resource Type", "Last Updated");
        println!("{}", "-".repeat(60));
        for (resource_type, timestamp) in shown {
            println!("{resource_type:<28} {timestamp:<30}");
        }
        println!();

        Ok(0)
    }
}
