use anyhow::{Context, Result};
use clap::Args;

use crate::config;

/// Prompt for a profile's credentials, region and role, then store them
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigureCommand {}

impl ConfigureCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        config::configure_interactive(profile)
            .await
            .with_context(|| format!("Failed to configure profile '{profile}'"))
    }
}
