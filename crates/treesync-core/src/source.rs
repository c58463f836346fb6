//! The read side of the backend, as seen by the sync pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::customer::CustomerId;
use crate::error::Result;
use crate::model::{AssetRecord, AttributeEntry, DeviceRecord, Relation};

/// Everything the pipeline reads from the backend.
///
/// Only the asset listing can fail a run. The per-asset and per-device
/// lookups degrade: an empty result (or `None`) stands for "nothing could be
/// fetched", and the implementation is expected to have logged why.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// All assets of the tenant, in the order the backend lists them.
    async fn list_assets(&self, customer: &CustomerId) -> Result<Vec<AssetRecord>>;

    /// Edges whose source is `asset`.
    async fn relations_from(&self, asset: &AssetRecord) -> Vec<Relation>;

    /// Edges whose target is `asset`.
    async fn relations_to(&self, asset: &AssetRecord) -> Vec<Relation>;

    /// `Contains` edges from `asset` to devices.
    async fn device_relations(&self, asset: &AssetRecord) -> Vec<Relation>;

    async fn device(&self, device_id: &str) -> Option<DeviceRecord>;

    /// Server-side attributes of `asset`, unfiltered.
    async fn attributes(&self, asset: &AssetRecord) -> Vec<AttributeEntry>;
}

pub type DynTopologySource = Arc<dyn TopologySource>;
