//! Resolving the backend credential for a tenant.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::customer::CustomerId;
use crate::error::{Result, StoreError, SyncError};

/// Persistent lookup of per-tenant backend tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the stored token for `customer`, if a row exists.
    ///
    /// A row with an empty token is returned as `Some("")`; blank handling is
    /// the caller's concern.
    async fn stored_token(
        &self,
        customer: &CustomerId,
    ) -> std::result::Result<Option<String>, StoreError>;
}

/// Type alias for a shareable token store.
pub type DynTokenStore = Arc<dyn TokenStore>;

/// Resolves a bearer token: stored per-tenant token first, then the static
/// fallback.
pub struct TokenProvider {
    store: DynTokenStore,
    fallback: Option<String>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(store: DynTokenStore, fallback: Option<String>) -> Self {
        let fallback = fallback.filter(|token| !token.trim().is_empty());
        Self { store, fallback }
    }

    /// Returns the credential to use for `customer`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when neither the store nor the
    /// fallback yields a non-blank token. Store failures are logged and fall
    /// through to the fallback.
    pub async fn resolve(&self, customer: &CustomerId) -> Result<String> {
        match self.store.stored_token(customer).await {
            Ok(Some(token)) if !token.trim().is_empty() => {
                info!(customer_id = %customer, "backend token loaded from store");
                return Ok(token.trim().to_string());
            }
            Ok(Some(_)) => warn!(customer_id = %customer, "stored token is empty"),
            Ok(None) => warn!(customer_id = %customer, "no stored token for customer"),
            Err(e) => warn!(customer_id = %customer, error = %e, "could not read token from store"),
        }

        match &self.fallback {
            Some(token) => {
                info!("using fallback backend token from configuration");
                Ok(token.trim().to_string())
            }
            None => Err(SyncError::configuration(format!(
                "No backend token available for customer {customer}. \
                 Set THINGSBOARD_TOKEN or store a token in customer_settings.tbtoken"
            ))),
        }
    }
}
