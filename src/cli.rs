use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{AccountsCommand, CompletionsCommand, ConfigureCommand};
use crate::config::Profile;

#[derive(Debug, Clone, Parser)]
#[command(name = "ctm", version, about = "List AWS Organizations accounts with static or assumed-role credentials", long_about = None, arg_required_else_help = false)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        help = "Profile name in the ctm config file"
    )]
    pub profile: String,

    #[arg(long, global = true, help = "AWS access key ID")]
    pub access_key: Option<String>,

    #[arg(long, global = true, help = "AWS secret access key")]
    pub secret_key: Option<String>,

    #[arg(long, global = true, help = "AWS region (e.g. us-west-2)")]
    pub region: Option<String>,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "List every account in the AWS Organization")]
    Accounts(AccountsCommand),
    #[command(about = "Configure credentials, region and assume-role settings")]
    Configure(ConfigureCommand),
    #[command(about = "Generate shell completion scripts for ctm")]
    Completions(CompletionsCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let flags = Profile {
            access_key: self.access_key,
            secret_key: self.secret_key,
            region: self.region,
            ..Profile::default()
        };
        let command = self
            .command
            .unwrap_or_else(|| Commands::Accounts(AccountsCommand::default()));

        match command {
            Commands::Accounts(cmd) => cmd.execute(&self.profile, flags).await,
            Commands::Configure(cmd) => cmd.execute(&self.profile).await,
            Commands::Completions(cmd) => {
                cmd.execute();
                Ok(())
            }
        }
    }
}
