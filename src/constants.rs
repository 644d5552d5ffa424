use std::{env, path::PathBuf};

use dirs;

/// Configuration directory name under `~/.config`
pub const CONFIG_DIR_NAME: &str = "ctm";

/// Profile configuration file name
pub const CONFIG_FILE_NAME: &str = "config";

/// Environment variable overriding the profile configuration file location
pub const CONFIG_FILE_ENV: &str = "CTM_CONFIG_FILE";

/// Access key environment variables, in lookup order
pub const ACCESS_KEY_ENVS: [&str; 2] = ["AWS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"];

pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

pub const REGION_ENV: &str = "AWS_REGION";

/// Ambient session token overlaid on top of the static credentials
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

/// Session name used when an assume-role request does not name one
pub const DEFAULT_SESSION_NAME: &str = "ctm-session";

/// Accepted AWS region shape (e.g. `us-west-2`)
pub const REGION_PATTERN: &str = r"^[a-z]{2}-[a-z]+-\d{1}$";

/// Accepted IAM role ARN shape
pub const ROLE_ARN_PATTERN: &str = r"^arn:aws:iam::\d{12}:role/[a-zA-Z0-9_+=,.@-]+$";

/// Account statuses AWS Organizations is known to return
pub const KNOWN_ACCOUNT_STATUSES: [&str; 3] = ["ACTIVE", "SUSPENDED", "PENDING_CLOSURE"];

/// Credentials provider name reported to the AWS SDK
pub const CREDENTIALS_PROVIDER_NAME: &str = "ctm";

/// Get the profile configuration file path
/// Respects CTM_CONFIG_FILE environment variable if set
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|home| {
        home.join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    })
}
