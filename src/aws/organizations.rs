use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use aws_sdk_organizations::Client as OrganizationsClient;
use aws_sdk_organizations::operation::list_accounts::ListAccountsOutput;
use aws_sdk_organizations::types::Account;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{IdentityState, IdentityStore};
use crate::constants::KNOWN_ACCOUNT_STATUSES;
use crate::context::CallContext;
use crate::error::{BoxError, Error, Result};

/// One account of the organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRecord {
    pub account_id: String,
    pub account_name: String,
    pub email: String,
    /// Raw status as reported by AWS Organizations
    pub status: String,
}

/// One page of `ListAccounts`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPage {
    pub accounts: Vec<AccountRecord>,
    /// Absent on the last page
    pub next_token: Option<String>,
}

/// Paginated account listing capability
pub trait ListAccountsApi: Send + Sync {
    fn list_accounts(
        &self,
        identity: &IdentityState,
        next_token: Option<&str>,
    ) -> impl Future<Output = Result<AccountPage, BoxError>> + Send;
}

/// AWS Organizations-backed [`ListAccountsApi`]
///
/// The SDK client is built once per identity and reused for every page
/// fetched with that identity.
#[derive(Debug, Default)]
pub struct SdkOrganizationsClient {
    cached: Mutex<Option<(IdentityState, OrganizationsClient)>>,
}

impl SdkOrganizationsClient {
    async fn client_for(&self, identity: &IdentityState) -> OrganizationsClient {
        let cached = self
            .lock_cache()
            .as_ref()
            .filter(|(cached_identity, _)| cached_identity == identity)
            .map(|(_, client)| client.clone());
        if let Some(client) = cached {
            return client;
        }

        debug!("Building AWS Organizations client");
        let config = identity.load_sdk_config().await;
        let client = OrganizationsClient::new(&config);
        *self.lock_cache() = Some((identity.clone(), client.clone()));
        client
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<(IdentityState, OrganizationsClient)>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ListAccountsApi for SdkOrganizationsClient {
    async fn list_accounts(
        &self,
        identity: &IdentityState,
        next_token: Option<&str>,
    ) -> Result<AccountPage, BoxError> {
        let client = self.client_for(identity).await;

        let response = client
            .list_accounts()
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await?;

        Ok(account_page(&response))
    }
}

fn account_page(response: &ListAccountsOutput) -> AccountPage {
    AccountPage {
        accounts: response.accounts().iter().map(account_record).collect(),
        next_token: response.next_token().map(str::to_string),
    }
}

/// Fields AWS leaves out become empty strings
fn account_record(account: &Account) -> AccountRecord {
    AccountRecord {
        account_id: account.id().unwrap_or_default().to_string(),
        account_name: account.name().unwrap_or_default().to_string(),
        email: account.email().unwrap_or_default().to_string(),
        status: account
            .status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_default(),
    }
}

/// Walks `ListAccounts` until the remote stops returning a continuation token
#[derive(Debug, Clone)]
pub struct AccountEnumerator<L> {
    api: L,
}

impl<L: ListAccountsApi> AccountEnumerator<L> {
    pub fn new(api: L) -> Self {
        Self { api }
    }

    /// Fetch every account, in page order.
    ///
    /// The identity is read once; every page of this run is fetched with that
    /// snapshot even if the store is replaced meanwhile. Any page failure or
    /// cancellation discards what was accumulated so far.
    pub async fn list_all(
        &self,
        store: &IdentityStore,
        ctx: &CallContext,
    ) -> Result<Vec<AccountRecord>> {
        let identity = store
            .snapshot()
            .map_err(|e| Error::ListAccountsFailed(Box::new(e)))?;

        info!("Listing AWS Organizations accounts");

        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = ctx
                .run(self.api.list_accounts(&identity, next_token.as_deref()))
                .await
                .map_err(|e| Error::ListAccountsFailed(Box::new(e)))?
                .map_err(Error::ListAccountsFailed)?;
            pages += 1;

            debug!(
                "Page {} returned {} accounts (more: {})",
                pages,
                page.accounts.len(),
                page.next_token.is_some()
            );

            for account in &page.accounts {
                if !KNOWN_ACCOUNT_STATUSES.contains(&account.status.as_str()) {
                    warn!(
                        "Account {} has unrecognized status '{}'",
                        account.account_id, account.status
                    );
                }
            }
            accounts.extend(page.accounts);

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        info!("Found {} accounts across {} pages", accounts.len(), pages);
        Ok(accounts)
    }
}
