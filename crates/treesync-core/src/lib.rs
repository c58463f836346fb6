//! Asset topology reconciliation for treesync.
//!
//! Turns the flat asset/relation view of a tenant into a single-parent tree
//! and hands it to a store. Backend and store access sit behind the
//! [`TopologySource`], [`TokenStore`] and [`TreeStore`] traits.

pub mod attributes;
pub mod customer;
pub mod error;
pub mod index;
pub mod model;
pub mod persist;
pub mod reconcile;
pub mod source;
pub mod sync;
pub mod token;
pub mod tree;

pub use attributes::{AssetAttributes, AttributeKey, UnknownAttribute};
pub use customer::CustomerId;
pub use error::{Result, StoreError, SyncError};
pub use index::{AssetIndex, AssetNode, DeviceSummary};
pub use model::{
    AssetPage, AssetRecord, AttributeEntry, CONTAINS, DeviceRecord, EntityId, EntityRef,
    EntityType, Relation,
};
pub use persist::{
    DynTreeStore, LARGE_TREE_CHARS, PersistReport, PersistenceGateway, StoreWrite, TreeStore,
    WriteMode,
};
pub use reconcile::{EdgeOutcome, GraphReconciler, Reconciled, ReconciliationConflict};
pub use source::{DynTopologySource, TopologySource};
pub use sync::{DEFAULT_MAX_CONCURRENCY, SyncOptions, SyncOutcome, SyncSummary, TopologySync};
pub use token::{DynTokenStore, TokenProvider, TokenStore};
pub use tree::{Tree, TreeNode, build_tree};
