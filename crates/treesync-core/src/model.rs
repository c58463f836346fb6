//! Wire types returned by the asset-management backend.
//!
//! These mirror the ThingsBoard REST payloads closely enough to deserialize
//! them, and nothing more. Reconciliation works on [`AssetIndex`] entries,
//! never on these records directly.
//!
//! [`AssetIndex`]: crate::index::AssetIndex

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Relation type of a parent → child containment edge.
pub const CONTAINS: &str = "Contains";

/// Kind of entity on either end of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Asset,
    Device,
    Other(String),
}

impl EntityType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Asset => "ASSET",
            Self::Device => "DEVICE",
            Self::Other(other) => other,
        }
    }
}

impl Default for EntityType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ASSET" => Self::Asset,
            "DEVICE" => Self::Device,
            _ => Self::Other(value),
        }
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        match value {
            EntityType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// Nested `{"id": "...", "entityType": "..."}` identifier object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityId {
    pub id: String,
    #[serde(default)]
    pub entity_type: EntityType,
}

/// One endpoint of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: String,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    #[must_use]
    pub fn asset(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: EntityType::Asset,
            name: None,
        }
    }

    #[must_use]
    pub fn device(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: EntityType::Device,
            name: None,
        }
    }
}

/// A directed, typed edge as reported by the relations endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: EntityRef,
    pub to: EntityRef,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_name: Option<String>,
}

impl Relation {
    /// Builds a `Contains` edge between two endpoints.
    #[must_use]
    pub fn contains(from: EntityRef, to: EntityRef) -> Self {
        Self {
            from,
            to,
            relation_type: CONTAINS.to_string(),
            type_group: None,
            from_name: None,
            to_name: None,
        }
    }

    #[must_use]
    pub fn is_contains(&self) -> bool {
        self.relation_type == CONTAINS
    }

    /// Asset → asset containment edge.
    #[must_use]
    pub fn is_asset_containment(&self) -> bool {
        self.is_contains()
            && self.from.entity_type == EntityType::Asset
            && self.to.entity_type == EntityType::Asset
    }

    #[must_use]
    pub fn from_label(&self) -> &str {
        self.from
            .name
            .as_deref()
            .or(self.from_name.as_deref())
            .unwrap_or("Unknown")
    }

    #[must_use]
    pub fn to_label(&self) -> &str {
        self.to
            .name
            .as_deref()
            .or(self.to_name.as_deref())
            .unwrap_or("Unknown")
    }
}

/// An asset as returned by the tenant asset listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: EntityId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub asset_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
}

impl AssetRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId {
                id: id.into(),
                entity_type: EntityType::Asset,
            },
            name: name.into(),
            asset_type: String::new(),
            label: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id.id
    }
}

/// One page of the tenant asset listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPage {
    pub data: Vec<AssetRecord>,
    #[serde(default)]
    pub has_next: bool,
}

/// Device detail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: EntityId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub device_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
}

/// One server-side attribute of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeEntry {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_ts: Option<i64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relation_info_deserialization() {
        let raw = json!({
            "from": {"entityType": "ASSET", "id": "a-1"},
            "to": {"entityType": "DEVICE", "id": "d-1"},
            "type": "Contains",
            "typeGroup": "COMMON",
            "additionalInfo": null,
            "fromName": "Building",
            "toName": "Thermostat"
        });

        let relation: Relation = serde_json::from_value(raw).unwrap();
        assert_eq!(relation.from.entity_type, EntityType::Asset);
        assert_eq!(relation.to.entity_type, EntityType::Device);
        assert!(relation.is_contains());
        assert!(!relation.is_asset_containment());
        assert_eq!(relation.from_label(), "Building");
        assert_eq!(relation.to_label(), "Thermostat");
    }

    #[test]
    fn test_unknown_entity_type_round_trips() {
        let ty: EntityType = serde_json::from_value(json!("CUSTOMER")).unwrap();
        assert_eq!(ty, EntityType::Other("CUSTOMER".into()));
        assert_eq!(serde_json::to_value(&ty).unwrap(), json!("CUSTOMER"));
    }

    #[test]
    fn test_asset_page_with_null_label() {
        let raw = json!({
            "data": [
                {
                    "id": {"id": "a-1", "entityType": "ASSET"},
                    "name": "Floor 1",
                    "type": "Floor",
                    "label": null
                }
            ],
            "totalPages": 1,
            "totalElements": 1,
            "hasNext": false
        });

        let page: AssetPage = serde_json::from_value(raw).unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id(), "a-1");
        assert_eq!(page.data[0].label, "");
        assert!(!page.has_next);
    }
}
