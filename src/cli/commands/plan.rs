//! Plan command implementation
//!
//! Prints the request queue a sync would start from, with stored cursors
//! affixed, without contacting the server.

use crate::config::load_config;
use crate::core::state::StateManager;
use crate::core::sync::{DownloadManager, DownloadWorkManager};
use clap::Args;
use std::sync::Arc;

/// Arguments for the plan command
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Also print the count-only URL per resource type
    #[arg(long)]
    pub summary_urls: bool,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let state = match StateManager::from_config(&config).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                println!("❌ Failed to open watermark store");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let mut manager = match DownloadManager::from_config(&config.sync, state) {
            Ok(m) => m,
            Err(e) => {
                println!("❌ Invalid sync URL configuration");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        // Count URLs must be derived before the queue is drained below
        let summary_urls = if self.summary_urls {
            Some(manager.summary_request_urls().await?)
        } else {
            None
        };

        println!("📋 Sync plan against {}", config.fhir.base_url);
        println!();

        let mut position = 0;
        while let Some(request) = manager.next_request().await? {
            position += 1;
            let resource_type = request
                .resource_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("{position:>3}. [{resource_type}] {}", request.url);
        }

        if position == 0 {
            println!("Nothing to sync: no URLs configured.");
        }

        if let Some(summary_urls) = summary_urls {
            println!();
            println!("Count requests:");
            for (resource_type, url) in summary_urls {
                println!("  {resource_type:<24} {url}");
            }
        }
        println!();

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_plan_rejects_unknown_resource_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fhirsync.toml");
        std::fs::write(
            &path,
            format!(
                r#"
[fhir]
base_url = "http://localhost:8080/fhir"
auth_type = "none"

[sync]
recurring_sync_urls = "Patient,Widget?_count=5"

[state]
directory = "{}"
"#,
                dir.path().join("state").display()
            ),
        )
        .unwrap();

        let code = PlanArgs::default()
            .execute(&path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
