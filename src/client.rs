use aws_smithy_types::date_time::Format;
use tracing::info;

use crate::aws::organizations::SdkOrganizationsClient;
use crate::aws::sts::SdkStsClient;
use crate::aws::{
    AccountEnumerator, AccountRecord, AssumeRoleApi, AssumeRoleRequest, IdentityStore,
    ListAccountsApi, RoleAssumer,
};
use crate::config::Settings;
use crate::context::CallContext;
use crate::error::Result;

/// A connected client: one identity plus the remote capabilities that use it.
#[derive(Debug)]
pub struct Client<A = SdkStsClient, L = SdkOrganizationsClient> {
    identity: IdentityStore,
    assumer: RoleAssumer<A>,
    enumerator: AccountEnumerator<L>,
}

impl Client {
    /// Connect with the AWS SDK-backed STS and Organizations clients.
    pub async fn from_settings(settings: &Settings, ctx: &CallContext) -> Result<Self> {
        Self::connect(
            settings,
            SdkStsClient,
            SdkOrganizationsClient::default(),
            ctx,
        )
        .await
    }
}

impl<A: AssumeRoleApi, L: ListAccountsApi> Client<A, L> {
    /// Build the identity from `settings`.
    ///
    /// The ambient session token belongs to the static keys, so it is
    /// overlaid before the role (if any) is assumed with them.
    pub async fn connect(
        settings: &Settings,
        sts: A,
        organizations: L,
        ctx: &CallContext,
    ) -> Result<Self> {
        let identity =
            IdentityStore::initialize(&settings.access_key, &settings.secret_key, &settings.region)?;

        if let Some(token) = settings.session_token.as_deref().filter(|t| !t.is_empty()) {
            identity.overlay_session_token(token)?;
        }

        let client = Self {
            identity,
            assumer: RoleAssumer::new(sts),
            enumerator: AccountEnumerator::new(organizations),
        };

        if let Some(request) = &settings.assume_role {
            client.assume_role(request, ctx).await?;
            if let Some(expiration) = client.identity.expiration()? {
                info!(
                    "Assumed role credentials expire at: {}",
                    expiration
                        .fmt(Format::DateTime)
                        .unwrap_or_else(|_| "unknown".to_string())
                );
            }
        }

        Ok(client)
    }

    pub fn identity(&self) -> &IdentityStore {
        &self.identity
    }

    pub async fn assume_role(&self, request: &AssumeRoleRequest, ctx: &CallContext) -> Result<()> {
        self.assumer.assume(&self.identity, request, ctx).await
    }

    pub fn set_session_token(&self, token: &str) -> Result<()> {
        self.identity.overlay_session_token(token)
    }

    pub async fn list_accounts(&self, ctx: &CallContext) -> Result<Vec<AccountRecord>> {
        self.enumerator.list_all(&self.identity, ctx).await
    }
}
