use std::sync::{Arc, RwLock};

use aws_smithy_types::DateTime;
use tracing::{debug, info};

use super::{Credentials, IdentityState};
use crate::error::{Error, Result};
use crate::validators;

/// Holder of the single live identity of a client.
///
/// The state sits in one slot behind a lock. Readers clone the `Arc` out and
/// writers build a complete replacement before swapping it in, so no reader
/// ever observes credentials mixed from two identities.
#[derive(Debug)]
pub struct IdentityStore {
    slot: RwLock<Arc<IdentityState>>,
}

impl IdentityStore {
    /// Build the store from static credentials and a region.
    pub fn initialize(access_key: &str, secret_key: &str, region: &str) -> Result<Self> {
        if access_key.is_empty() {
            return Err(Error::ConfigLoadFailed("access key is empty".to_string()));
        }
        if secret_key.is_empty() {
            return Err(Error::ConfigLoadFailed("secret key is empty".to_string()));
        }
        if !validators::is_valid_region(region) {
            return Err(Error::ConfigLoadFailed(format!(
                "region '{region}' must be a valid AWS region (e.g., us-west-2)"
            )));
        }

        info!("Using region: {}", region);
        Ok(Self::from_state(IdentityState {
            region: region.to_string(),
            credentials: Credentials::new(access_key, secret_key),
        }))
    }

    pub fn from_state(state: IdentityState) -> Self {
        Self {
            slot: RwLock::new(Arc::new(state)),
        }
    }

    /// Consistent view of the current identity.
    pub fn snapshot(&self) -> Result<Arc<IdentityState>> {
        self.slot
            .read()
            .map(|state| Arc::clone(&state))
            .map_err(|_| Error::CredentialRetrievalFailed("identity store is poisoned".to_string()))
    }

    /// Expiry of the active credentials, when the issuer reported one.
    pub fn expiration(&self) -> Result<Option<DateTime>> {
        Ok(self.snapshot()?.credentials.expiration())
    }

    /// Keep the current keys but carry `token` as the session token.
    pub fn overlay_session_token(&self, token: &str) -> Result<()> {
        let mut slot = self.slot.write().map_err(|_| {
            Error::CredentialRetrievalFailed("identity store is poisoned".to_string())
        })?;

        let current = &slot.credentials;
        let credentials = Credentials::new(current.access_key_id(), current.secret_access_key())
            .with_session_token(token);
        let next = Arc::new(IdentityState {
            region: slot.region.clone(),
            credentials,
        });

        *slot = next;
        debug!("Session token overlaid on active credentials");
        Ok(())
    }

    /// Swap in a new credential set, keeping the region.
    pub(crate) fn replace_credentials(&self, credentials: Credentials) -> Result<()> {
        let mut slot = self.slot.write().map_err(|_| {
            Error::CredentialRetrievalFailed("identity store is poisoned".to_string())
        })?;

        let next = Arc::new(IdentityState {
            region: slot.region.clone(),
            credentials,
        });

        *slot = next;
        Ok(())
    }

    /// Poison the lock the way a writer panicking mid-update would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        std::thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = self.slot.write();
                    panic!("writer died");
                })
                .join();
        });
    }
}
