//! Writing the tree to the tenant store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::customer::CustomerId;
use crate::error::{Result, StoreError};
use crate::tree::Tree;

/// Documents above this many characters are logged as unusually large.
pub const LARGE_TREE_CHARS: usize = 1_000_000;

/// How the store applied a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// An existing row was updated.
    Updated,
    /// No row existed; a new one was inserted.
    Inserted,
}

/// Result of one committed store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreWrite {
    pub mode: WriteMode,
    /// Length in characters read back after commit, if the row was found.
    pub stored_len: Option<usize>,
}

/// Durable per-tenant tree storage.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Stores `document` for `customer`: update the existing row, insert one
    /// if nothing was updated, commit, then read back the stored length.
    async fn write_tree(
        &self,
        customer: &CustomerId,
        document: &str,
    ) -> std::result::Result<StoreWrite, StoreError>;
}

/// Type alias for a shareable tree store.
pub type DynTreeStore = Arc<dyn TreeStore>;

/// Outcome of [`PersistenceGateway::persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    pub mode: WriteMode,
    pub serialized_len: usize,
    pub stored_len: Option<usize>,
}

impl PersistReport {
    /// `true` when the read-back length equals the serialized length.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.stored_len == Some(self.serialized_len)
    }
}

/// Serializes a tree and hands it to a [`TreeStore`].
pub struct PersistenceGateway {
    store: DynTreeStore,
}

impl PersistenceGateway {
    #[must_use]
    pub fn new(store: DynTreeStore) -> Self {
        Self { store }
    }

    /// Persists `tree` for `customer`.
    ///
    /// A length mismatch after commit is logged, not raised: the write has
    /// already happened.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`](crate::SyncError::Serialization)
    /// or [`SyncError::Persistence`](crate::SyncError::Persistence).
    pub async fn persist(&self, customer: &CustomerId, tree: &Tree) -> Result<PersistReport> {
        let document = tree.to_json()?;
        let serialized_len = document.chars().count();
        info!(
            customer_id = %customer,
            root_nodes = tree.len(),
            serialized_len,
            "saving tree"
        );
        if serialized_len > LARGE_TREE_CHARS {
            warn!(serialized_len, "tree document is very large");
        }

        let write = self.store.write_tree(customer, &document).await?;
        let report = PersistReport {
            mode: write.mode,
            serialized_len,
            stored_len: write.stored_len,
        };

        match report.stored_len {
            Some(stored) if stored == serialized_len => {
                info!(mode = ?report.mode, stored_len = stored, "tree saved and verified");
            }
            Some(stored) => {
                warn!(
                    serialized_len,
                    stored_len = stored,
                    "size mismatch between serialized and stored tree"
                );
            }
            None => warn!("stored tree could not be read back for verification"),
        }

        Ok(report)
    }
}
