//! Sync command implementation
//!
//! This module implements the `sync` command, which runs one incremental
//! download pass against the configured FHIR server.

use crate::adapters::fhir::create_fhir_server;
use crate::adapters::storage::create_resource_sink;
use crate::config::{load_config, FhirSyncConfig};
use crate::core::state::StateManager;
use crate::core::sync::{DownloadManager, RunnerOptions, SyncRunner, SyncSummary};
use crate::domain::FhirSyncError;
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the sync command
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Dry run mode - fetch and process pages without writing resources or watermarks
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many requests
    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    /// Stop at the first failed request
    #[arg(long)]
    pub fail_fast: bool,

    /// Ask the server for match counts before downloading
    #[arg(long)]
    pub with_counts: bool,
}

impl SyncArgs {
    /// Apply command line overrides to the loaded configuration
    pub fn apply_overrides(&self, config: &mut FhirSyncConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
        if let Some(max_pages) = self.max_pages {
            tracing::info!(max_pages, "Overriding page limit from CLI");
            config.sync.max_pages = Some(max_pages);
        }
        if self.fail_fast {
            config.sync.continue_on_error = false;
        }
        if self.with_counts {
            config.sync.fetch_summary_counts = true;
        }
    }

    /// Execute the sync command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting sync command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.application.dry_run {
            tracing::info!("Dry run mode enabled - no resources or watermarks will be written");
            println!("🔍 DRY RUN MODE - No resources or watermarks will be written");
            println!();
        }

        let state = match StateManager::from_config(&config).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::error!(error = %e, "Failed to open watermark store");
                eprintln!("Failed to open watermark store: {e}");
                return Ok(5);
            }
        };

        let mut manager = match DownloadManager::from_config(&config.sync, state.clone()) {
            Ok(m) => m,
            Err(e @ FhirSyncError::UnrecognizedResourceType(_)) => {
                tracing::error!(error = %e, "Invalid sync URL configuration");
                eprintln!("Invalid sync URL configuration: {e}");
                return Ok(2);
            }
            Err(e) => return Err(e.into()),
        };

        let server = match create_fhir_server(&config.fhir) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create FHIR client");
                eprintln!("Failed to initialize FHIR client: {e}");
                return Ok(2);
            }
        };

        let sink = match create_resource_sink(&config).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to prepare output directory");
                eprintln!("Failed to prepare output directory: {e}");
                return Ok(5);
            }
        };

        println!("🚀 Starting sync of {} queries...", manager.pending_len());
        println!();

        let runner = SyncRunner::new(server, sink, shutdown_signal)
            .with_options(RunnerOptions::from(&config.sync));

        let summary = match runner.run(&mut manager).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Sync failed");
                eprintln!("Sync failed: {e}");
                return Ok(5);
            }
        };
        summary.log_summary();

        print_summary(&summary);

        match state.get_all_watermarks().await {
            Ok(watermarks) if !watermarks.is_empty() => {
                println!("🕒 Watermarks:");
                for (resource_type, timestamp) in &watermarks {
                    println!("  {resource_type:<24} {timestamp}");
                }
                println!();
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read watermarks for display"),
        }

        Ok(exit_code(&summary))
    }
}

fn print_summary(summary: &SyncSummary) {
    println!();
    println!("📊 Sync Summary:");
    println!("  Requests: {}", summary.requests_issued);
    println!("  Pages Processed: {}", summary.pages_processed);
    println!("  Resources Downloaded: {}", summary.resources_downloaded);
    println!("  Failed Requests: {}", summary.failed_requests);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    for (resource_type, count) in &summary.resources_by_type {
        let expected = summary
            .expected_totals
            .iter()
            .find(|(t, _)| t.as_str() == resource_type)
            .map(|(_, total)| format!(" (server total {total})"))
            .unwrap_or_default();
        println!("    {resource_type:<24} {count}{expected}");
    }
    println!();

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in summary.errors.iter().take(10) {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(url) = &error.url {
                println!("    URL: {url}");
            }
        }
        if summary.errors.len() > 10 {
            println!("  ... and {} more errors", summary.errors.len() - 10);
        }
        println!();
    }
}

/// Exit code for a finished pass
fn exit_code(summary: &SyncSummary) -> i32 {
    if summary.interrupted {
        println!("⚠️  Sync interrupted. Watermarks cover every fully processed page.");
        println!("   Run the same command to resume.");
        130
    } else if summary.is_successful() {
        if summary.page_limit_reached {
            println!("✅ Sync stopped at the page limit");
        } else {
            println!("✅ Sync completed successfully!");
        }
        0
    } else {
        println!("⚠️  Sync completed with failures");
        1
    }
}
