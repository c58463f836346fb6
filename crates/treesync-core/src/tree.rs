//! Materializing the reconciled forest into the persisted tree.

use serde::{Deserialize, Serialize};

use crate::attributes::AssetAttributes;
use crate::index::{AssetIndex, AssetNode, DeviceSummary};

/// One asset of the output tree.
///
/// Field order matters: it is the order of keys in the persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub has_devices: bool,
    pub children: Vec<TreeNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_devices: Vec<DeviceSummary>,
    #[serde(flatten)]
    pub attributes: AssetAttributes,
}

impl TreeNode {
    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

/// Ordered sequence of root assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree(pub Vec<TreeNode>);

impl Tree {
    #[must_use]
    pub fn roots(&self) -> &[TreeNode] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.0.iter().map(TreeNode::node_count).sum()
    }

    /// Canonical text encoding: compact JSON, non-ASCII left unescaped.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Builds the tree from a reconciled index.
///
/// Roots keep enumeration order. Children are sorted by name (then id) at
/// every level, so the result does not depend on the order in which edges
/// were applied.
#[must_use]
pub fn build_tree(index: &AssetIndex) -> Tree {
    Tree(index.roots().map(|root| build_node(index, root)).collect())
}

fn build_node(index: &AssetIndex, node: &AssetNode) -> TreeNode {
    let mut children: Vec<&AssetNode> = node
        .children
        .iter()
        .filter_map(|id| index.get(id))
        .collect();
    children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let has_devices = node.has_devices();
    TreeNode {
        id: node.id.clone(),
        name: node.name.clone(),
        node_type: node.asset_type.clone(),
        label: node.label.clone(),
        has_devices,
        children: children
            .into_iter()
            .map(|child| build_node(index, child))
            .collect(),
        related_devices: if has_devices {
            node.related_devices.clone()
        } else {
            Vec::new()
        },
        attributes: node.attributes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeKey;
    use crate::model::{AssetRecord, EntityRef, Relation};
    use crate::reconcile::GraphReconciler;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn reconciler(records: &[(&str, &str)]) -> GraphReconciler {
        let records: Vec<AssetRecord> = records
            .iter()
            .map(|(id, name)| AssetRecord::new(*id, *name))
            .collect();
        GraphReconciler::new(AssetIndex::from_records(&records).0)
    }

    fn contains(parent: &str, child: &str) -> Relation {
        Relation::contains(EntityRef::asset(parent), EntityRef::asset(child))
    }

    #[test]
    fn test_single_asset_without_edges() {
        let tree = build_tree(reconciler(&[("a", "A")]).index());
        assert_json_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!([{
                "id": "a",
                "name": "A",
                "type": "",
                "label": "",
                "hasDevices": false,
                "children": []
            }])
        );
    }

    #[test]
    fn test_children_sorted_by_name_regardless_of_edge_order() {
        let assets = [("p", "Property"), ("x", "Zeta"), ("y", "Alpha"), ("z", "Mid")];
        let mut forward = reconciler(&assets);
        forward.apply_edges(&[contains("p", "x"), contains("p", "y"), contains("p", "z")]);

        let mut reverse = reconciler(&assets);
        reverse.apply_edges(&[contains("p", "z"), contains("p", "y"), contains("p", "x")]);

        let forward = build_tree(forward.index());
        let reverse = build_tree(reverse.index());
        assert_eq!(forward, reverse);

        let names: Vec<&str> = forward.roots()[0]
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn test_devices_and_attributes_in_output() {
        let mut reconciler = reconciler(&[("a", "A"), ("b", "B")]);
        reconciler.apply_edge(&contains("a", "b"));
        reconciler.attach_devices("b", vec![DeviceSummary::from_details("d-1", None)]);

        let mut attributes = AssetAttributes::default();
        attributes.set(AttributeKey::MaxTemp, json!(25.0));
        attributes.set(AttributeKey::RunStatus, json!("active"));
        reconciler.merge_attributes("a", attributes);

        let tree = build_tree(reconciler.index());
        assert_json_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!([{
                "id": "a",
                "name": "A",
                "type": "",
                "label": "",
                "hasDevices": false,
                "children": [{
                    "id": "b",
                    "name": "B",
                    "type": "",
                    "label": "",
                    "hasDevices": true,
                    "children": [],
                    "relatedDevices": [
                        {
                            "id": "d-1",
                            "name": "Unbekannt",
                            "type": "Unbekannt",
                            "label": "Unbekannt"
                        }
                    ]
                }],
                "maxTemp": 25.0,
                "runStatus": "active"
            }])
        );
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_key_order_of_serialized_node() {
        let mut reconciler = reconciler(&[("a", "A")]);
        reconciler.attach_devices("a", vec![DeviceSummary::from_details("d-1", None)]);
        let mut attributes = AssetAttributes::default();
        attributes.set(AttributeKey::ChildLock, json!(true));
        reconciler.merge_attributes("a", attributes);

        let json = build_tree(reconciler.index()).to_json().unwrap();
        let keys = [
            "\"id\"",
            "\"hasDevices\"",
            "\"children\"",
            "\"relatedDevices\"",
            "\"childLock\"",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn test_non_ascii_names_unescaped() {
        let tree = build_tree(reconciler(&[("a", "Schloss Montabaur Süd")]).index());
        let json = tree.to_json().unwrap();
        assert!(json.contains("Süd"));
    }

    #[test]
    fn test_tree_deserializes_back() {
        let mut reconciler = reconciler(&[("a", "A"), ("b", "B")]);
        reconciler.apply_edge(&contains("a", "b"));
        let tree = build_tree(reconciler.index());
        let parsed: Tree = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
        assert_eq!(parsed, tree);
    }
}
