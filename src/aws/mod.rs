use std::fmt;
use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_smithy_types::DateTime;

use crate::constants::CREDENTIALS_PROVIDER_NAME;

pub mod identity;
pub mod organizations;
pub mod sts;

/// AWS credential set
///
/// Immutable once built; a new identity is always a fresh value.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    expiration: Option<DateTime>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    /// Attach a session token. An empty token means no token.
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        let session_token = session_token.into();
        self.session_token = (!session_token.is_empty()).then_some(session_token);
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn expiration(&self) -> Option<DateTime> {
        self.expiration
    }

    fn to_sdk(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            self.session_token.clone(),
            self.expiration.and_then(|dt| SystemTime::try_from(dt).ok()),
            CREDENTIALS_PROVIDER_NAME,
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Region plus the active credential set used to authorize remote calls
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityState {
    pub region: String,
    pub credentials: Credentials,
}

impl IdentityState {
    /// Load an SDK config that authenticates with exactly this identity
    pub async fn load_sdk_config(&self) -> SdkConfig {
        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(self.credentials.to_sdk())
            .load()
            .await
    }
}

pub use identity::IdentityStore;
pub use organizations::{AccountEnumerator, AccountPage, AccountRecord, ListAccountsApi};
pub use sts::{AssumeRoleApi, AssumeRoleInput, AssumeRoleRequest, RoleAssumer};
