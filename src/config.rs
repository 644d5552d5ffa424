use crate::aws::AssumeRoleRequest;
use crate::constants::{
    self, ACCESS_KEY_ENVS, DEFAULT_SESSION_NAME, REGION_ENV, SECRET_KEY_ENV, SESSION_TOKEN_ENV,
};
use crate::validators;
use anyhow::{Context, Result, bail};
use dialoguer::{Input, Password, theme::ColorfulTheme};
use ini::{Ini, Properties};
use std::collections::BTreeMap;
use std::{env, path::PathBuf};
use tokio::fs;

/// One source of connection settings (CLI flags or a profile section).
/// Unset values fall through to the next source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub role_arn: Option<String>,
    pub session_name: Option<String>,
    pub external_id: Option<String>,
    pub duration_seconds: Option<i32>,
    pub policy_arns: Vec<String>,
    pub policy: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub transitive_tag_keys: Vec<String>,
}

impl Profile {
    fn from_ini_section(section: &Properties) -> Result<Self> {
        let get = |key: &str| {
            section
                .get(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let duration_seconds = section
            .get("duration_seconds")
            .filter(|value| !value.is_empty())
            .map(str::parse::<i32>)
            .transpose()
            .context("duration_seconds must be an integer")?;

        let tags = section
            .get("tags")
            .map(split_list)
            .unwrap_or_default()
            .iter()
            .map(|tag| parse_tag(tag).map_err(anyhow::Error::msg))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            access_key: get("access_key"),
            secret_key: get("secret_key"),
            region: get("region"),
            role_arn: get("role_arn"),
            session_name: get("session_name"),
            external_id: get("external_id"),
            duration_seconds,
            policy_arns: section.get("policy_arns").map(split_list).unwrap_or_default(),
            policy: get("policy"),
            tags,
            transitive_tag_keys: section
                .get("transitive_tag_keys")
                .map(split_list)
                .unwrap_or_default(),
        })
    }

    /// List values are stored comma-separated and tags as `KEY=VALUE`, so
    /// entries carrying those separators cannot be read back.
    fn check_storable(&self) -> Result<()> {
        let lists = [
            ("policy_arns", &self.policy_arns),
            ("transitive_tag_keys", &self.transitive_tag_keys),
        ];
        for (field, items) in lists {
            if let Some(item) = items.iter().find(|item| item.contains(',')) {
                bail!("{field} entry '{item}' must not contain ','");
            }
        }
        for (key, value) in &self.tags {
            if key.contains([',', '=']) {
                bail!("tag key '{key}' must not contain ',' or '='");
            }
            if value.contains(',') {
                bail!("value of tag '{key}' must not contain ','");
            }
        }
        Ok(())
    }

    fn save_to_ini(&self, ini: &mut Ini, profile: &str) -> Result<()> {
        self.check_storable()?;

        let section_name = section_name(profile);
        ini.delete(Some(section_name.as_str()));

        let mut section = ini.with_section(Some(section_name));
        let optional = [
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("region", &self.region),
            ("role_arn", &self.role_arn),
            ("session_name", &self.session_name),
            ("external_id", &self.external_id),
            ("policy", &self.policy),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                section.set(key, value);
            }
        }
        if let Some(duration) = self.duration_seconds {
            section.set("duration_seconds", duration.to_string());
        }
        if !self.policy_arns.is_empty() {
            section.set("policy_arns", self.policy_arns.join(","));
        }
        if !self.tags.is_empty() {
            let tags = self
                .tags
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(",");
            section.set("tags", tags);
        }
        if !self.transitive_tag_keys.is_empty() {
            section.set("transitive_tag_keys", self.transitive_tag_keys.join(","));
        }
        Ok(())
    }

    /// Fill every unset value of `self` from `fallback`.
    pub fn or(self, fallback: Profile) -> Profile {
        fn list<T>(primary: Vec<T>, fallback: Vec<T>) -> Vec<T> {
            if primary.is_empty() { fallback } else { primary }
        }

        Profile {
            access_key: self.access_key.or(fallback.access_key),
            secret_key: self.secret_key.or(fallback.secret_key),
            region: self.region.or(fallback.region),
            role_arn: self.role_arn.or(fallback.role_arn),
            session_name: self.session_name.or(fallback.session_name),
            external_id: self.external_id.or(fallback.external_id),
            duration_seconds: self.duration_seconds.or(fallback.duration_seconds),
            policy_arns: list(self.policy_arns, fallback.policy_arns),
            policy: self.policy.or(fallback.policy),
            tags: if self.tags.is_empty() {
                fallback.tags
            } else {
                self.tags
            },
            transitive_tag_keys: list(self.transitive_tag_keys, fallback.transitive_tag_keys),
        }
    }

    /// The assume-role block, present only when a role ARN is set.
    pub fn assume_role_request(&self) -> Option<AssumeRoleRequest> {
        let role_arn = self.role_arn.as_ref().filter(|arn| !arn.is_empty())?;
        Some(AssumeRoleRequest {
            role_arn: role_arn.clone(),
            session_name: self.session_name.clone(),
            external_id: self.external_id.clone(),
            duration_seconds: self.duration_seconds,
            policy_arns: self.policy_arns.clone(),
            policy: self.policy.clone(),
            tags: self.tags.clone(),
            transitive_tag_keys: self.transitive_tag_keys.clone(),
        })
    }
}

/// Fully resolved connection settings handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Ambient session token from the environment
    pub session_token: Option<String>,
    pub assume_role: Option<AssumeRoleRequest>,
}

impl Settings {
    /// Resolve settings from `profile`, falling back to the environment for
    /// the credentials, the region and the session token.
    pub fn resolve(profile: Profile) -> Result<Self> {
        let access_key = profile
            .access_key
            .clone()
            .or_else(|| ACCESS_KEY_ENVS.iter().find_map(|name| env_value(name)))
            .unwrap_or_default();
        let secret_key = profile
            .secret_key
            .clone()
            .or_else(|| env_value(SECRET_KEY_ENV))
            .unwrap_or_default();
        let region = profile
            .region
            .clone()
            .or_else(|| env_value(REGION_ENV))
            .unwrap_or_default();

        let mut missing = Vec::new();
        if access_key.is_empty() {
            missing.push(
                "Missing AWS Access Key: either set AWS_ACCESS_KEY/AWS_ACCESS_KEY_ID environment variable or provide access_key in configuration",
            );
        }
        if secret_key.is_empty() {
            missing.push(
                "Missing AWS Secret Key: either set AWS_SECRET_ACCESS_KEY environment variable or provide secret_key in configuration",
            );
        }
        if region.is_empty() {
            missing.push(
                "Missing AWS Region: either set AWS_REGION environment variable or provide region in configuration",
            );
        }
        if !missing.is_empty() {
            bail!(missing.join("\n"));
        }

        Ok(Self {
            access_key,
            secret_key,
            region,
            session_token: env_value(SESSION_TOKEN_ENV),
            assume_role: profile.assume_role_request(),
        })
    }
}

/// Load a profile section. A missing file or section yields `None`.
pub async fn load(profile: &str) -> Result<Option<Profile>> {
    let path = get_config_path()?;
    if !fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(None);
    }

    let ini = Ini::load_from_file(&path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;

    ini.section(Some(section_name(profile).as_str()))
        .map(Profile::from_ini_section)
        .transpose()
        .with_context(|| format!("Invalid settings in profile '{profile}'"))
}

pub async fn save(profile: &str, settings: &Profile) -> Result<()> {
    let path = get_config_path()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut ini = if path.exists() {
        Ini::load_from_file(&path).unwrap_or_else(|_| Ini::new())
    } else {
        Ini::new()
    };

    settings
        .save_to_ini(&mut ini, profile)
        .with_context(|| format!("Cannot store profile '{profile}'"))?;

    ini.write_to_file(&path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    // The profile may hold a secret key
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(&path).await?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(&path, permissions).await?;
    }

    tracing::info!("Configuration saved to profile: {}", profile);
    Ok(())
}

pub async fn configure_interactive(profile: &str) -> Result<()> {
    println!("Configuring ctm for profile: {profile}");

    let existing = load(profile).await?;

    if existing.is_some() {
        println!("Press Enter to keep current values, or type new values.");
    }
    println!();

    let theme = ColorfulTheme::default();
    let current = existing.unwrap_or_default();

    let region = Input::<String>::with_theme(&theme)
        .with_prompt("AWS Region")
        .default(current.region.clone().unwrap_or_default())
        .allow_empty(true)
        .validate_with(|input: &String| {
            if input.is_empty() || validators::is_valid_region(input) {
                Ok(())
            } else {
                Err("Region must be a valid AWS region (e.g., us-west-2)")
            }
        })
        .interact_text()
        .context("Failed to read AWS region")?;

    let access_key = Input::<String>::with_theme(&theme)
        .with_prompt("AWS Access Key ID (empty to use the environment)")
        .default(current.access_key.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read AWS access key")?;

    let secret_key = Password::with_theme(&theme)
        .with_prompt("AWS Secret Access Key (empty to keep current)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read AWS secret key")?;

    let role_arn = Input::<String>::with_theme(&theme)
        .with_prompt("Role ARN to assume (empty for none)")
        .default(current.role_arn.clone().unwrap_or_default())
        .allow_empty(true)
        .validate_with(|input: &String| {
            if input.is_empty() || validators::is_valid_role_arn(input) {
                Ok(())
            } else {
                Err("Role ARN must be a valid AWS IAM role ARN")
            }
        })
        .interact_text()
        .context("Failed to read role ARN")?;

    let (session_name, duration_seconds) = if role_arn.is_empty() {
        (None, None)
    } else {
        let session_name = Input::<String>::with_theme(&theme)
            .with_prompt("Session name")
            .default(
                current
                    .session_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string()),
            )
            .interact_text()
            .context("Failed to read session name")?;

        let duration_seconds = Input::<i32>::with_theme(&theme)
            .with_prompt("Session duration in seconds (0 for the role default)")
            .default(current.duration_seconds.unwrap_or(0))
            .interact_text()
            .context("Failed to read session duration")?;

        (Some(session_name), (duration_seconds > 0).then_some(duration_seconds))
    };

    let some = |value: String| (!value.is_empty()).then_some(value);
    let updated = Profile {
        access_key: some(access_key),
        secret_key: some(secret_key).or(current.secret_key.clone()),
        region: some(region),
        role_arn: some(role_arn),
        session_name,
        duration_seconds,
        ..current
    };

    save(profile, &updated).await?;

    println!("\nConfiguration saved successfully.");
    Ok(())
}

/// Parse a `KEY=VALUE` session tag
pub fn parse_tag(tag: &str) -> Result<(String, String), String> {
    match tag.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("invalid tag '{tag}': expected KEY=VALUE")),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn get_config_path() -> Result<PathBuf> {
    constants::get_config_path().context("Failed to determine ctm config path")
}
