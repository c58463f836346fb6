//! Folding raw relation edges into a single-parent forest.
//!
//! Every asset is queried from both sides: edges where it is the source
//! (`fromId`) and edges where it is the target (`toId`). The second query
//! recovers parent edges that are only visible from the child's side.
//! [`combine_parent_edges`] merges the two, and [`GraphReconciler`] applies
//! the result to an [`AssetIndex`] under these rules:
//!
//! - the first applied parent assignment wins; a later edge naming a
//!   different parent is rejected;
//! - a child is never listed twice under the same parent;
//! - an edge that would close a cycle is rejected.
//!
//! Edges are applied in the order they are handed in. Callers feed them in
//! asset enumeration order, so conflict resolution does not depend on which
//! fetch happened to finish first.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::{debug, warn};

use crate::attributes::AssetAttributes;
use crate::index::{AssetIndex, DeviceSummary};
use crate::model::{EntityType, Relation};

/// A containment edge that was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationConflict {
    /// The child already has a different parent.
    ParentConflict {
        child_id: String,
        existing_parent_id: String,
        rejected_parent_id: String,
    },
    /// The child is already listed under this parent.
    DuplicateChild { child_id: String, parent_id: String },
    /// The parent is the child itself or one of its descendants.
    Cycle { child_id: String, parent_id: String },
}

impl ReconciliationConflict {
    /// Duplicates are the normal result of seeing one edge from both ends.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateChild { .. })
    }
}

impl fmt::Display for ReconciliationConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentConflict {
                child_id,
                existing_parent_id,
                rejected_parent_id,
            } => write!(
                f,
                "asset {child_id} already has parent {existing_parent_id}, \
                 rejected {rejected_parent_id}"
            ),
            Self::DuplicateChild {
                child_id,
                parent_id,
            } => write!(f, "asset {child_id} is already a child of {parent_id}"),
            Self::Cycle {
                child_id,
                parent_id,
            } => write!(f, "edge {parent_id} -> {child_id} would create a cycle"),
        }
    }
}

/// What happened to one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeOutcome {
    Applied,
    Rejected(ReconciliationConflict),
    /// Not an asset → asset containment edge.
    Ignored,
    /// One endpoint is not an asset of this tenant.
    UnknownEndpoint,
}

/// Merges the `fromId` and `toId` query results of one asset.
///
/// `fromId` results are already oriented parent → child and are kept
/// verbatim. A `toId` result is kept only if it really targets `asset_id`
/// (the backend may return a superset) and is an asset → asset `Contains`
/// edge.
#[must_use]
pub fn combine_parent_edges(
    asset_id: &str,
    from_edges: Vec<Relation>,
    to_edges: Vec<Relation>,
) -> Vec<Relation> {
    let mut combined = from_edges;
    for edge in to_edges {
        if edge.to.id != asset_id {
            continue;
        }
        if edge.is_asset_containment() {
            debug!(
                asset_id,
                parent_id = %edge.from.id,
                parent_name = edge.from_label(),
                "found parent relation via toId query"
            );
            combined.push(edge);
        }
    }
    combined
}

/// Keeps only edges pointing at devices.
#[must_use]
pub fn device_edges(edges: Vec<Relation>) -> Vec<Relation> {
    edges
        .into_iter()
        .filter(|edge| edge.to.entity_type == EntityType::Device)
        .collect()
}

/// Single-writer reconciliation state for one run.
#[derive(Debug)]
pub struct GraphReconciler {
    index: AssetIndex,
    conflicts: Vec<ReconciliationConflict>,
    unresolved: BTreeSet<String>,
    applied: usize,
}

impl GraphReconciler {
    #[must_use]
    pub fn new(index: AssetIndex) -> Self {
        Self {
            index,
            conflicts: Vec::new(),
            unresolved: BTreeSet::new(),
            applied: 0,
        }
    }

    #[must_use]
    pub fn index(&self) -> &AssetIndex {
        &self.index
    }

    /// Applies one edge to the index.
    pub fn apply_edge(&mut self, edge: &Relation) -> EdgeOutcome {
        if !edge.is_contains() || edge.to.entity_type != EntityType::Asset {
            return EdgeOutcome::Ignored;
        }

        let parent_id = edge.from.id.as_str();
        let child_id = edge.to.id.as_str();

        let (Some(parent), Some(child)) = (self.index.get(parent_id), self.index.get(child_id))
        else {
            debug!(parent_id, child_id, "edge references an asset outside this tenant");
            if self.index.contains(child_id) {
                self.unresolved.insert(child_id.to_string());
            }
            return EdgeOutcome::UnknownEndpoint;
        };

        if let Some(existing) = child.parent_id.as_deref()
            && existing != parent_id
        {
            warn!(
                child_id,
                child_name = %child.name,
                existing_parent_id = existing,
                rejected_parent_id = parent_id,
                "asset already has a parent, rejecting edge"
            );
            return self.reject(ReconciliationConflict::ParentConflict {
                child_id: child_id.to_string(),
                existing_parent_id: existing.to_string(),
                rejected_parent_id: parent_id.to_string(),
            });
        }

        if parent.children.iter().any(|c| c == child_id) {
            debug!(child_id, parent_id, "asset is already a child of this parent");
            return self.reject(ReconciliationConflict::DuplicateChild {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }

        if self.index.is_ancestor_or_self(child_id, parent_id) {
            warn!(child_id, parent_id, "edge would create a cycle, rejecting");
            self.unresolved.insert(child_id.to_string());
            return self.reject(ReconciliationConflict::Cycle {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }

        let parent_name = parent.name.clone();
        let child_name = child.name.clone();
        if let Some(child) = self.index.get_mut(child_id) {
            child.parent_id = Some(parent_id.to_string());
        }
        if let Some(parent) = self.index.get_mut(parent_id) {
            parent.children.push(child_id.to_string());
        }
        self.applied += 1;
        debug!(
            parent_id,
            child_id,
            "{parent_name} contains {child_name}"
        );
        EdgeOutcome::Applied
    }

    /// Applies a batch of edges in order and returns how many were applied.
    pub fn apply_edges<'a>(&mut self, edges: impl IntoIterator<Item = &'a Relation>) -> usize {
        edges
            .into_iter()
            .filter(|edge| self.apply_edge(edge) == EdgeOutcome::Applied)
            .count()
    }

    /// Records the devices of an asset. Repeated device ids keep their first
    /// occurrence.
    pub fn attach_devices(&mut self, asset_id: &str, devices: Vec<DeviceSummary>) {
        let Some(node) = self.index.get_mut(asset_id) else {
            return;
        };
        let mut seen: HashSet<String> = HashSet::new();
        node.related_devices = devices
            .into_iter()
            .filter(|device| seen.insert(device.id.clone()))
            .collect();
    }

    /// Merges fetched attributes into an asset. Returns `false` when the
    /// asset is unknown.
    pub fn merge_attributes(&mut self, asset_id: &str, attributes: AssetAttributes) -> bool {
        match self.index.get_mut(asset_id) {
            Some(node) => {
                node.attributes.merge(attributes);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn finish(self) -> Reconciled {
        Reconciled {
            index: self.index,
            conflicts: self.conflicts,
            unresolved: self.unresolved,
            applied_edges: self.applied,
        }
    }

    fn reject(&mut self, conflict: ReconciliationConflict) -> EdgeOutcome {
        self.conflicts.push(conflict.clone());
        EdgeOutcome::Rejected(conflict)
    }
}

/// The reconciled forest plus everything that was refused on the way.
#[derive(Debug)]
pub struct Reconciled {
    pub index: AssetIndex,
    pub conflicts: Vec<ReconciliationConflict>,
    /// Assets that were the target of a containment edge that could not be
    /// applied (unknown parent or cycle).
    pub unresolved: BTreeSet<String>,
    pub applied_edges: usize,
}

impl Reconciled {
    /// Roots that arose from missing or refused parent edges.
    #[must_use]
    pub fn orphans(&self) -> Vec<&str> {
        self.index
            .roots()
            .filter(|node| self.unresolved.contains(&node.id))
            .map(|node| node.id.as_str())
            .collect()
    }

    /// Parent conflicts and cycles; duplicates are not counted.
    #[must_use]
    pub fn rejected_edges(&self) -> usize {
        self.conflicts.iter().filter(|c| !c.is_duplicate()).count()
    }

    #[must_use]
    pub fn duplicate_edges(&self) -> usize {
        self.conflicts.iter().filter(|c| c.is_duplicate()).count()
    }
}
