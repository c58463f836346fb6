//! Orchestration of one topology build.
//!
//! A build runs three fan-out stages against a [`TopologySource`], each an
//! ordered, bounded pool of in-flight requests:
//!
//! 1. per asset: relations from, relations to and device relations;
//! 2. per distinct device id: device details;
//! 3. per asset: attributes.
//!
//! Every stage finishes completely before the next one starts. Results come
//! back in asset enumeration order whatever the completion order was, and
//! the forest is assembled on the calling task once all fetching is done.

use std::collections::{BTreeSet, HashMap, HashSet};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::attributes::AssetAttributes;
use crate::customer::CustomerId;
use crate::error::Result;
use crate::index::{AssetIndex, DeviceSummary};
use crate::model::{AssetRecord, DeviceRecord, Relation};
use crate::reconcile::{
    GraphReconciler, ReconciliationConflict, combine_parent_edges, device_edges,
};
use crate::source::DynTopologySource;
use crate::tree::{Tree, build_tree};

/// Default number of in-flight requests per stage.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub max_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub total_assets: usize,
    pub root_assets: usize,
    pub total_devices: usize,
    pub devices_with_details: usize,
    /// Assets whose attribute listing reported at least one whitelisted
    /// key, even if only with a `null` value.
    pub attributes_successful: usize,
    pub attributes_failed: usize,
    pub assets_with_children: usize,
    pub assets_with_parent: usize,
    pub orphaned_assets: usize,
    pub rejected_edges: usize,
}

impl SyncSummary {
    /// Emits the summary line, plus a warning when orphans were found.
    pub fn log(&self) {
        info!(
            total_assets = self.total_assets,
            root_assets = self.root_assets,
            total_devices = self.total_devices,
            devices_with_details = self.devices_with_details,
            attributes_successful = self.attributes_successful,
            attributes_failed = self.attributes_failed,
            assets_with_children = self.assets_with_children,
            assets_with_parent = self.assets_with_parent,
            orphaned_assets = self.orphaned_assets,
            rejected_edges = self.rejected_edges,
            "tree structure summary"
        );
        if self.orphaned_assets > 0 {
            warn!(
                orphaned_assets = self.orphaned_assets,
                "assets without a resolvable parent were placed at root level"
            );
        }
    }
}

/// Result of [`TopologySync::build`].
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub tree: Tree,
    pub summary: SyncSummary,
    /// Every refused edge, duplicates included.
    pub conflicts: Vec<ReconciliationConflict>,
    /// Ids of orphaned roots, in enumeration order.
    pub orphans: Vec<String>,
}

/// Stage 1 result for one asset.
struct AssetRelations {
    parent_edges: Vec<Relation>,
    device_ids: Vec<String>,
}

/// Builds the asset tree of one tenant.
pub struct TopologySync {
    source: DynTopologySource,
    options: SyncOptions,
}

impl TopologySync {
    #[must_use]
    pub fn new(source: DynTopologySource, options: SyncOptions) -> Self {
        let options = SyncOptions {
            max_concurrency: options.max_concurrency.max(1),
        };
        Self { source, options }
    }

    /// Fetches, reconciles and materializes the tenant's topology.
    ///
    /// # Errors
    ///
    /// Only a failed asset listing aborts the build. Every per-asset or
    /// per-device failure degrades to missing data.
    pub async fn build(&self, customer: &CustomerId) -> Result<SyncOutcome> {
        let listed = self.source.list_assets(customer).await?;
        let (index, duplicates) = AssetIndex::from_records(&listed);
        if !duplicates.is_empty() {
            warn!(
                count = duplicates.len(),
                ids = ?duplicates,
                "asset listing repeated ids, keeping first"
            );
        }
        let assets = unique_records(listed);
        info!(assets = assets.len(), "assets enumerated");

        let relations = self.fetch_relations(&assets).await;

        let device_ids: BTreeSet<&str> = relations
            .iter()
            .flat_map(|r| r.device_ids.iter().map(String::as_str))
            .collect();
        let details = self.fetch_devices(&device_ids).await;
        info!(
            devices = device_ids.len(),
            with_details = details.len(),
            "device details fetched"
        );

        let attributes = self.fetch_attributes(&assets).await;

        let mut reconciler = GraphReconciler::new(index);
        let mut attributes_successful = 0;
        for (asset, (attrs, reported)) in assets.iter().zip(attributes) {
            if reported == 0 {
                continue;
            }
            debug!(asset_id = asset.id(), reported, set = attrs.len(), "attributes merged");
            if reconciler.merge_attributes(asset.id(), attrs) {
                attributes_successful += 1;
            }
        }
        for (asset, related) in assets.iter().zip(&relations) {
            let devices = related
                .device_ids
                .iter()
                .map(|id| DeviceSummary::from_details(id, details.get(id.as_str())))
                .collect();
            reconciler.attach_devices(asset.id(), devices);
        }
        for related in &relations {
            reconciler.apply_edges(&related.parent_edges);
        }

        let reconciled = reconciler.finish();
        debug!(
            applied = reconciled.applied_edges,
            duplicates = reconciled.duplicate_edges(),
            "containment edges reconciled"
        );

        let tree = build_tree(&reconciled.index);
        let orphans: Vec<String> = reconciled.orphans().into_iter().map(str::to_string).collect();
        let nodes = &reconciled.index;
        let summary = SyncSummary {
            total_assets: nodes.len(),
            root_assets: nodes.roots().count(),
            total_devices: device_ids.len(),
            devices_with_details: details.len(),
            attributes_successful,
            attributes_failed: assets.len() - attributes_successful,
            assets_with_children: nodes.iter().filter(|n| !n.children.is_empty()).count(),
            assets_with_parent: nodes.iter().filter(|n| n.parent_id.is_some()).count(),
            orphaned_assets: orphans.len(),
            rejected_edges: reconciled.rejected_edges(),
        };

        Ok(SyncOutcome {
            tree,
            summary,
            conflicts: reconciled.conflicts,
            orphans,
        })
    }

    async fn fetch_relations(&self, assets: &[AssetRecord]) -> Vec<AssetRelations> {
        let source = &self.source;
        stream::iter(assets)
            .map(|asset| async move {
                let (from, to, devices) = tokio::join!(
                    source.relations_from(asset),
                    source.relations_to(asset),
                    source.device_relations(asset),
                );
                AssetRelations {
                    parent_edges: combine_parent_edges(asset.id(), from, to),
                    device_ids: device_edges(devices).into_iter().map(|e| e.to.id).collect(),
                }
            })
            .buffered(self.options.max_concurrency)
            .collect()
            .await
    }

    async fn fetch_devices(&self, ids: &BTreeSet<&str>) -> HashMap<String, DeviceRecord> {
        let source = &self.source;
        stream::iter(ids.iter().copied())
            .map(|id| async move { (id, source.device(id).await) })
            .buffered(self.options.max_concurrency)
            .filter_map(|(id, details)| async move { details.map(|d| (id.to_string(), d)) })
            .collect()
            .await
    }

    /// Per asset: the whitelisted attributes and how many whitelisted keys
    /// the backend reported.
    async fn fetch_attributes(&self, assets: &[AssetRecord]) -> Vec<(AssetAttributes, usize)> {
        let source = &self.source;
        stream::iter(assets)
            .map(|asset| async move { AssetAttributes::extract(source.attributes(asset).await) })
            .buffered(self.options.max_concurrency)
            .collect()
            .await
    }
}

fn unique_records(records: Vec<AssetRecord>) -> Vec<AssetRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.id().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::model::{AttributeEntry, EntityId, EntityRef, EntityType};
    use crate::source::TopologySource;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default, Clone)]
    struct FakeSource {
        assets: Vec<AssetRecord>,
        from: HashMap<String, Vec<Relation>>,
        to: HashMap<String, Vec<Relation>>,
        devices: HashMap<String, Vec<Relation>>,
        details: HashMap<String, DeviceRecord>,
        attributes: HashMap<String, Vec<AttributeEntry>>,
        fail_listing: bool,
        /// Non-zero seeds add a pseudo-random delay to every call.
        seed: u64,
    }

    impl FakeSource {
        fn with_assets(ids: &[(&str, &str)]) -> Self {
            Self {
                assets: ids.iter().map(|(id, name)| AssetRecord::new(*id, *name)).collect(),
                ..Default::default()
            }
        }

        fn edge_from(mut self, parent: &str, child: &str) -> Self {
            self.from
                .entry(parent.to_string())
                .or_default()
                .push(contains(parent, child));
            self
        }

        fn edge_to(mut self, parent: &str, child: &str) -> Self {
            self.to
                .entry(child.to_string())
                .or_default()
                .push(contains(parent, child));
            self
        }

        fn device(mut self, asset: &str, device: &str, details: bool) -> Self {
            self.devices
                .entry(asset.to_string())
                .or_default()
                .push(Relation::contains(EntityRef::asset(asset), EntityRef::device(device)));
            if details {
                self.details.insert(
                    device.to_string(),
                    DeviceRecord {
                        id: EntityId {
                            id: device.to_string(),
                            entity_type: EntityType::Device,
                        },
                        name: format!("Thermostat {device}"),
                        device_type: "thermostat".into(),
                        label: String::new(),
                    },
                );
            }
            self
        }

        fn attribute(mut self, asset: &str, key: &str, value: Value) -> Self {
            self.attributes
                .entry(asset.to_string())
                .or_default()
                .push(AttributeEntry {
                    key: key.to_string(),
                    value,
                    last_update_ts: None,
                });
            self
        }

        async fn delay(&self, call: &str, key: &str) {
            if self.seed == 0 {
                return;
            }
            let mut hasher = DefaultHasher::new();
            (self.seed, call, key).hash(&mut hasher);
            tokio::time::sleep(Duration::from_millis(hasher.finish() % 500)).await;
        }
    }

    #[async_trait]
    impl TopologySource for FakeSource {
        async fn list_assets(&self, _customer: &CustomerId) -> Result<Vec<AssetRecord>> {
            if self.fail_listing {
                return Err(SyncError::asset_list("backend answered 401"));
            }
            Ok(self.assets.clone())
        }

        async fn relations_from(&self, asset: &AssetRecord) -> Vec<Relation> {
            self.delay("from", asset.id()).await;
            self.from.get(asset.id()).cloned().unwrap_or_default()
        }

        async fn relations_to(&self, asset: &AssetRecord) -> Vec<Relation> {
            self.delay("to", asset.id()).await;
            self.to.get(asset.id()).cloned().unwrap_or_default()
        }

        async fn device_relations(&self, asset: &AssetRecord) -> Vec<Relation> {
            self.delay("devices", asset.id()).await;
            self.devices.get(asset.id()).cloned().unwrap_or_default()
        }

        async fn device(&self, device_id: &str) -> Option<DeviceRecord> {
            self.delay("device", device_id).await;
            self.details.get(device_id).cloned()
        }

        async fn attributes(&self, asset: &AssetRecord) -> Vec<AttributeEntry> {
            self.delay("attributes", asset.id()).await;
            self.attributes.get(asset.id()).cloned().unwrap_or_default()
        }
    }

    fn contains(parent: &str, child: &str) -> Relation {
        Relation::contains(EntityRef::asset(parent), EntityRef::asset(child))
    }

    fn customer() -> CustomerId {
        CustomerId::parse("3143ef00-647d-11ef-8cd8-8b580d9aa086").unwrap()
    }

    async fn build(source: FakeSource) -> SyncOutcome {
        TopologySync::new(Arc::new(source), SyncOptions::default())
            .build(&customer())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_asset() {
        let outcome = build(FakeSource::with_assets(&[("a", "A")])).await;

        assert_eq!(outcome.tree.len(), 1);
        let root = &outcome.tree.roots()[0];
        assert_eq!(root.id, "a");
        assert!(root.children.is_empty());
        assert!(!root.has_devices);
        assert_eq!(outcome.summary.root_assets, 1);
        assert_eq!(outcome.summary.orphaned_assets, 0);
    }

    #[tokio::test]
    async fn test_from_edge_nests_child() {
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B")]).edge_from("a", "b");
        let outcome = build(source).await;

        assert_eq!(outcome.tree.len(), 1);
        assert_eq!(outcome.tree.roots()[0].children[0].id, "b");
        assert_eq!(outcome.summary.assets_with_children, 1);
        assert_eq!(outcome.summary.assets_with_parent, 1);
    }

    #[tokio::test]
    async fn test_to_only_edge_is_recovered() {
        // The parent's fromId query misses the edge; only the child sees it.
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B")]).edge_to("a", "b");
        let outcome = build(source).await;

        assert_eq!(outcome.tree.len(), 1);
        assert_eq!(outcome.tree.roots()[0].id, "a");
        assert_eq!(outcome.tree.roots()[0].children[0].id, "b");
    }

    #[tokio::test]
    async fn test_edge_seen_from_both_sides_is_not_a_conflict() {
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B")])
            .edge_from("a", "b")
            .edge_to("a", "b");
        let outcome = build(source).await;

        assert_eq!(outcome.tree.roots()[0].children.len(), 1);
        assert_eq!(outcome.summary.rejected_edges, 0);
        assert!(outcome.conflicts.iter().all(ReconciliationConflict::is_duplicate));
    }

    #[tokio::test]
    async fn test_conflicting_parents_first_wins() {
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B"), ("c", "C")])
            .edge_from("a", "c")
            .edge_from("b", "c");
        let outcome = build(source).await;

        let roots: Vec<&str> = outcome.tree.roots().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["a", "b"]);
        assert_eq!(outcome.tree.roots()[0].children[0].id, "c");
        assert!(outcome.tree.roots()[1].children.is_empty());
        assert_eq!(outcome.summary.rejected_edges, 1);
        assert_eq!(
            outcome.conflicts,
            vec![ReconciliationConflict::ParentConflict {
                child_id: "c".into(),
                existing_parent_id: "a".into(),
                rejected_parent_id: "b".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_parent_outside_tenant_makes_orphan() {
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B")]).edge_to("foreign", "b");
        let outcome = build(source).await;

        assert_eq!(outcome.tree.len(), 2);
        assert_eq!(outcome.orphans, vec!["b".to_string()]);
        assert_eq!(outcome.summary.orphaned_assets, 1);
    }

    #[tokio::test]
    async fn test_devices_attached_with_placeholders() {
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B")])
            .device("a", "d-1", true)
            .device("a", "d-2", false)
            .device("b", "d-1", true);
        let outcome = build(source).await;

        let a = &outcome.tree.roots()[0];
        assert!(a.has_devices);
        assert_eq!(a.related_devices.len(), 2);
        assert_eq!(a.related_devices[0].name, "Thermostat d-1");
        assert_eq!(a.related_devices[1].name, "Unbekannt");
        assert!(outcome.tree.roots()[1].has_devices);

        assert_eq!(outcome.summary.total_devices, 2);
        assert_eq!(outcome.summary.devices_with_details, 1);
    }

    #[tokio::test]
    async fn test_attribute_counts_and_whitelist() {
        let source = FakeSource::with_assets(&[("a", "A"), ("b", "B"), ("c", "C")])
            .attribute("a", "maxTemp", json!(24))
            .attribute("a", "firmware", json!("1.2"))
            .attribute("b", "firmware", json!("1.2"))
            .attribute("c", "runStatus", Value::Null);
        let outcome = build(source).await;

        let json = serde_json::to_value(&outcome.tree).unwrap();
        assert_eq!(json[0]["maxTemp"], json!(24));
        assert!(json[0].get("firmware").is_none());
        assert!(json[2].get("runStatus").is_none());
        // "c" reported a whitelisted key, so it counts even though nothing was set.
        assert_eq!(outcome.summary.attributes_successful, 2);
        assert_eq!(outcome.summary.attributes_failed, 1);
    }

    #[tokio::test]
    async fn test_asset_list_failure_aborts() {
        let source = FakeSource {
            fail_listing: true,
            ..Default::default()
        };
        let err = TopologySync::new(Arc::new(source), SyncOptions::default())
            .build(&customer())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AssetList { .. }));
    }

    #[tokio::test]
    async fn test_empty_tenant_builds_empty_tree() {
        let outcome = build(FakeSource::default()).await;
        assert!(outcome.tree.is_empty());
        assert_eq!(outcome.summary, SyncSummary::default());
    }

    #[tokio::test]
    async fn test_repeated_asset_ids_counted_once() {
        let mut source = FakeSource::with_assets(&[("a", "A"), ("b", "B")]);
        source.assets.push(AssetRecord::new("a", "Again"));
        let outcome = build(source).await;

        assert_eq!(outcome.summary.total_assets, 2);
        assert_eq!(outcome.summary.attributes_failed, 2);
        assert_eq!(outcome.tree.roots()[0].name, "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_independent_of_completion_order() {
        let ids: Vec<(String, String)> = (0..40)
            .map(|i| (format!("asset-{i:02}"), format!("Room {}", 40 - i)))
            .collect();
        let refs: Vec<(&str, &str)> = ids.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();

        let mut source = FakeSource::with_assets(&refs);
        for i in 1..40 {
            let child = format!("asset-{i:02}");
            // Two candidate parents per child, one visible from each side.
            source = source
                .edge_from(&format!("asset-{:02}", i / 3), &child)
                .edge_to(&format!("asset-{:02}", (i - 1) / 2), &child);
            if i % 4 == 0 {
                source = source.device(&child, &format!("dev-{}", i % 7), i % 8 == 0);
            }
        }

        let mut documents = Vec::new();
        let mut conflicts = Vec::new();
        for (seed, concurrency) in [(0, 32), (7, 32), (13, 3), (21, 1)] {
            let source = FakeSource {
                seed,
                ..source.clone()
            };
            let outcome = TopologySync::new(
                Arc::new(source),
                SyncOptions {
                    max_concurrency: concurrency,
                },
            )
            .build(&customer())
            .await
            .unwrap();
            assert_eq!(
                outcome.summary.root_assets + outcome.summary.assets_with_parent,
                outcome.summary.total_assets
            );
            documents.push(outcome.tree.to_json().unwrap());
            conflicts.push(outcome.conflicts);
        }

        assert!(documents.windows(2).all(|w| w[0] == w[1]));
        assert!(conflicts.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let sync = TopologySync::new(
            Arc::new(FakeSource::default()),
            SyncOptions { max_concurrency: 0 },
        );
        assert_eq!(sync.options.max_concurrency, 1);
    }
}
