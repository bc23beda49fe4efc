//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for fhirsync using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// fhirsync - Incremental FHIR download tool
#[derive(Parser, Debug)]
#[command(name = "fhirsync")]
#[command(version, about, long_about = None)]
#[command(author = "fhirsync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "fhirsync.toml", env = "FHIRSYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FHIRSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download new and updated resources from the FHIR server
    Sync(commands::sync::SyncArgs),

    /// Show stored watermarks
    Status(commands::status::StatusArgs),

    /// Clear stored watermarks
    Reset(commands::reset::ResetArgs),

    /// Print the request queue a sync would start from
    Plan(commands::plan::PlanArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
