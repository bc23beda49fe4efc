//! Reset command implementation
//!
//! Clears stored watermarks so the next sync fetches everything again.

use crate::config::load_config;
use crate::core::state::StateManager;
use crate::domain::ResourceType;
use clap::Args;

/// Arguments for the reset command
#[derive(Args, Debug, Default)]
pub struct ResetArgs {
    /// Only reset this resource type
    #[arg(long, value_name = "TYPE")]
    pub resource_type: Option<ResourceType>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetArgs {
    /// Execute the reset command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let target = match self.resource_type {
            Some(resource_type) => format!("the {resource_type} watermark"),
            None => "all watermarks".to_string(),
        };

        if !self.yes {
            print!("Reset {target}? The next sync will download from scratch. [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Reset cancelled.");
                return Ok(0);
            }
        }

        let state = match StateManager::from_config(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to open watermark store");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if let Err(e) = state.clear(self.resource_type).await {
            println!("❌ Failed to reset watermarks");
            println!("   Error: {e}");
            return Ok(5);
        }

        println!("✅ Reset {target}");
        Ok(0)
    }
}
