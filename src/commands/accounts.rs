use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use comfy_table::{ContentArrangement, Table};
use tracing::info;

use crate::aws::AccountRecord;
use crate::config::{self, Profile, Settings, parse_tag};
use crate::context::CallContext;
use crate::{Client, Error};

const LIST_ACCOUNTS_HINT: &str = "Could not read AWS accounts. This could be due to invalid AWS credentials, missing IAM permissions (organizations:ListAccounts), an invalid AWS region configuration or network connectivity issues. Please check your AWS credentials and permissions";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Assume-role flags; each one overrides the profile's value
#[derive(Debug, Clone, Default, Args)]
pub struct RoleArgs {
    #[arg(long, help = "ARN of the role to assume")]
    pub role_arn: Option<String>,

    #[arg(long, help = "Session name to use when assuming the role")]
    pub session_name: Option<String>,

    #[arg(long, help = "External ID to use when assuming the role")]
    pub external_id: Option<String>,

    #[arg(long, help = "Duration of the assumed role session in seconds")]
    pub duration_seconds: Option<i32>,

    #[arg(long = "policy-arn", help = "ARN of an IAM policy for the session (repeatable)")]
    pub policy_arns: Vec<String>,

    #[arg(long, help = "IAM policy document for the session")]
    pub policy: Option<String>,

    #[arg(long = "tag", value_parser = parse_tag, help = "Session tag as KEY=VALUE (repeatable)")]
    pub tags: Vec<(String, String)>,

    #[arg(long = "transitive-tag-key", help = "Tag key passed on to chained sessions (repeatable)")]
    pub transitive_tag_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct AccountsCommand {
    #[command(flatten)]
    pub role: RoleArgs,

    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, help = "Output format")]
    pub output: OutputFormat,

    #[arg(long, help = "Give up after this many seconds")]
    pub timeout: Option<u64>,
}

impl AccountsCommand {
    pub async fn execute(self, profile: &str, flags: Profile) -> Result<()> {
        let ctx = match self.timeout {
            Some(secs) => CallContext::background().with_timeout(Duration::from_secs(secs)),
            None => CallContext::background(),
        };

        let file = config::load(profile)
            .await
            .with_context(|| format!("Failed to load configuration for profile '{profile}'"))?
            .unwrap_or_default();
        let settings = Settings::resolve(self.role.into_profile(flags).or(file))?;

        let client = Client::from_settings(&settings, &ctx)
            .await
            .context("Failed to create AWS client")?;

        let accounts = client.list_accounts(&ctx).await.map_err(|e| match e {
            Error::ListAccountsFailed(_) if !e.is_cancellation() => {
                anyhow::Error::new(e).context(LIST_ACCOUNTS_HINT)
            }
            other => anyhow::Error::new(other),
        })?;

        info!("Retrieved {} accounts", accounts.len());

        match self.output {
            OutputFormat::Table => println!("{}", render_table(&accounts)),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&accounts).context("Failed to serialize accounts")?
            ),
        }
        Ok(())
    }
}

impl RoleArgs {
    fn into_profile(self, flags: Profile) -> Profile {
        Profile {
            role_arn: self.role_arn,
            session_name: self.session_name,
            external_id: self.external_id,
            duration_seconds: self.duration_seconds,
            policy_arns: self.policy_arns,
            policy: self.policy,
            tags: self.tags.into_iter().collect(),
            transitive_tag_keys: self.transitive_tag_keys,
            ..flags
        }
    }
}

fn render_table(accounts: &[AccountRecord]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ACCOUNT ID", "NAME", "EMAIL", "STATUS"]);

    for account in accounts {
        table.add_row(vec![
            account.account_id.clone(),
            account.account_name.clone(),
            account.email.clone(),
            account.status.clone(),
        ]);
    }
    table
}
