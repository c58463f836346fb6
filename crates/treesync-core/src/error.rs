//! Error types for the topology sync pipeline.
//!
//! Only fatal conditions are errors. Transient fetch failures degrade to empty
//! results inside the fetch layer and reconciliation conflicts are reported as
//! [`ReconciliationConflict`](crate::reconcile::ReconciliationConflict) values.

/// Errors raised by token and tree stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to connect to the store.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// A statement failed to execute.
    #[error("Query error: {message}")]
    Query {
        /// Description of the failed statement.
        message: String,
    },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Query` error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Fatal errors of a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No credential could be resolved, or the configuration is unusable.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The tenant identifier is malformed.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The asset enumeration returned no usable payload.
    #[error("Failed to fetch assets: {message}")]
    AssetList { message: String },

    /// The store rejected the write or could not be reached.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The tree could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `AssetList` error.
    #[must_use]
    pub fn asset_list(message: impl Into<String>) -> Self {
        Self::AssetList {
            message: message.into(),
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
