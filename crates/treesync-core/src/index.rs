//! The per-run asset index.
//!
//! [`AssetIndex`] is the single mutable source of truth while a forest is
//! being reconciled. Children are stored as ids, not nested values; the
//! nested shape only exists in the output [`Tree`](crate::tree::Tree).
//! Entries keep the order in which assets were enumerated.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attributes::AssetAttributes;
use crate::model::{AssetRecord, DeviceRecord};

/// Device entry attached to an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub label: String,
}

impl DeviceSummary {
    /// Placeholder for fields of a device whose details could not be fetched.
    pub const UNKNOWN: &'static str = "Unbekannt";

    /// Builds a summary from fetched details, or a placeholder when the
    /// detail fetch failed.
    #[must_use]
    pub fn from_details(id: &str, details: Option<&DeviceRecord>) -> Self {
        match details {
            Some(device) => Self {
                id: id.to_string(),
                name: device.name.clone(),
                device_type: device.device_type.clone(),
                label: device.label.clone(),
            },
            None => Self {
                id: id.to_string(),
                name: Self::UNKNOWN.to_string(),
                device_type: Self::UNKNOWN.to_string(),
                label: Self::UNKNOWN.to_string(),
            },
        }
    }
}

/// One asset while the forest is under reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetNode {
    pub id: String,
    pub name: String,
    pub asset_type: String,
    pub label: String,
    /// Set at most once by the reconciler.
    pub parent_id: Option<String>,
    /// Child asset ids in the order their edges were applied.
    pub children: Vec<String>,
    pub related_devices: Vec<DeviceSummary>,
    pub attributes: AssetAttributes,
}

impl AssetNode {
    #[must_use]
    pub fn from_record(record: &AssetRecord) -> Self {
        Self {
            id: record.id().to_string(),
            name: record.name.clone(),
            asset_type: record.asset_type.clone(),
            label: record.label.clone(),
            parent_id: None,
            children: Vec::new(),
            related_devices: Vec::new(),
            attributes: AssetAttributes::default(),
        }
    }

    /// Derived from `related_devices`, so the two can never disagree.
    #[must_use]
    pub fn has_devices(&self) -> bool {
        !self.related_devices.is_empty()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Asset id → [`AssetNode`], in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    nodes: IndexMap<String, AssetNode>,
}

impl AssetIndex {
    /// Builds an index from the enumerated assets.
    ///
    /// Ids must be unique within a run; a repeated id keeps its first record
    /// and is returned in the second element.
    #[must_use]
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a AssetRecord>,
    ) -> (Self, Vec<String>) {
        let mut nodes = IndexMap::new();
        let mut duplicates = Vec::new();
        for record in records {
            if nodes.contains_key(record.id()) {
                duplicates.push(record.id().to_string());
                continue;
            }
            nodes.insert(record.id().to_string(), AssetNode::from_record(record));
        }
        (Self { nodes }, duplicates)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AssetNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut AssetNode> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetNode> {
        self.nodes.values()
    }

    /// Nodes without a parent, in enumeration order.
    pub fn roots(&self) -> impl Iterator<Item = &AssetNode> {
        self.nodes.values().filter(|node| node.is_root())
    }

    /// Returns `true` if `ancestor` is `id` itself or lies on its parent chain.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            // Parent chains are acyclic; the bound only guards against a
            // corrupted index.
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(node_id).and_then(|n| n.parent_id.as_deref());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_keeps_first_duplicate() {
        let records = vec![
            AssetRecord::new("a", "First"),
            AssetRecord::new("b", "B"),
            AssetRecord::new("a", "Second"),
        ];

        let (index, duplicates) = AssetIndex::from_records(&records);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a").unwrap().name, "First");
        assert_eq!(duplicates, vec!["a".to_string()]);

        let order: Vec<&str> = index.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_ancestor_walk() {
        let records = vec![
            AssetRecord::new("a", "A"),
            AssetRecord::new("b", "B"),
            AssetRecord::new("c", "C"),
        ];
        let (mut index, _) = AssetIndex::from_records(&records);
        index.get_mut("b").unwrap().parent_id = Some("a".into());
        index.get_mut("c").unwrap().parent_id = Some("b".into());

        assert!(index.is_ancestor_or_self("a", "c"));
        assert!(index.is_ancestor_or_self("c", "c"));
        assert!(!index.is_ancestor_or_self("c", "a"));
        assert_eq!(index.roots().count(), 1);
    }

    #[test]
    fn test_device_summary_placeholder() {
        let summary = DeviceSummary::from_details("d-1", None);
        assert_eq!(summary.id, "d-1");
        assert_eq!(summary.name, "Unbekannt");
        assert_eq!(summary.device_type, "Unbekannt");
        assert_eq!(summary.label, "Unbekannt");
    }
}
