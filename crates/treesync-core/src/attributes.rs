//! Whitelisted asset attributes.
//!
//! The backend exposes arbitrary key/value attributes per asset. Only a fixed
//! set of nine keys is carried into the tree; everything else is dropped at
//! extraction time. Values keep whatever JSON type the backend reported, since
//! the same key is a string on one installation and a number on another.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::AttributeEntry;

/// The attribute keys carried into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKey {
    OperationalMode,
    ChildLock,
    FixValue,
    MaxTemp,
    MinTemp,
    ExtTempDevice,
    OverruleMinutes,
    RunStatus,
    SchedulerPlan,
}

impl AttributeKey {
    pub const ALL: [Self; 9] = [
        Self::OperationalMode,
        Self::ChildLock,
        Self::FixValue,
        Self::MaxTemp,
        Self::MinTemp,
        Self::ExtTempDevice,
        Self::OverruleMinutes,
        Self::RunStatus,
        Self::SchedulerPlan,
    ];

    /// Backend key name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OperationalMode => "operationalMode",
            Self::ChildLock => "childLock",
            Self::FixValue => "fixValue",
            Self::MaxTemp => "maxTemp",
            Self::MinTemp => "minTemp",
            Self::ExtTempDevice => "extTempDevice",
            Self::OverruleMinutes => "overruleMinutes",
            Self::RunStatus => "runStatus",
            Self::SchedulerPlan => "schedulerPlan",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key outside the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown attribute key: {0}")]
pub struct UnknownAttribute(pub String);

impl FromStr for AttributeKey {
    type Err = UnknownAttribute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownAttribute(s.to_string()))
    }
}

/// The nine whitelisted attribute slots of an asset.
///
/// A slot is `None` when the backend did not report the key or reported it as
/// `null`; unset slots are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operational_mode: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_lock: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_temp_device: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrule_minutes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_plan: Option<Value>,
}

impl AssetAttributes {
    /// Extracts the whitelisted keys from a raw attribute listing.
    ///
    /// Later entries for the same key overwrite earlier ones.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = AttributeEntry>) -> Self {
        Self::extract(entries).0
    }

    /// Like [`AssetAttributes::from_entries`], also returning how many
    /// whitelisted entries the listing carried, `null` values included.
    #[must_use]
    pub fn extract(entries: impl IntoIterator<Item = AttributeEntry>) -> (Self, usize) {
        let mut attributes = Self::default();
        let mut reported = 0;
        for entry in entries {
            match attributes.set_named(&entry.key, entry.value) {
                Ok(_) => reported += 1,
                Err(UnknownAttribute(key)) => {
                    tracing::trace!(key = %key, "ignoring non-whitelisted attribute");
                }
            }
        }
        (attributes, reported)
    }

    #[must_use]
    pub fn get(&self, key: AttributeKey) -> Option<&Value> {
        match key {
            AttributeKey::OperationalMode => self.operational_mode.as_ref(),
            AttributeKey::ChildLock => self.child_lock.as_ref(),
            AttributeKey::FixValue => self.fix_value.as_ref(),
            AttributeKey::MaxTemp => self.max_temp.as_ref(),
            AttributeKey::MinTemp => self.min_temp.as_ref(),
            AttributeKey::ExtTempDevice => self.ext_temp_device.as_ref(),
            AttributeKey::OverruleMinutes => self.overrule_minutes.as_ref(),
            AttributeKey::RunStatus => self.run_status.as_ref(),
            AttributeKey::SchedulerPlan => self.scheduler_plan.as_ref(),
        }
    }

    fn slot_mut(&mut self, key: AttributeKey) -> &mut Option<Value> {
        match key {
            AttributeKey::OperationalMode => &mut self.operational_mode,
            AttributeKey::ChildLock => &mut self.child_lock,
            AttributeKey::FixValue => &mut self.fix_value,
            AttributeKey::MaxTemp => &mut self.max_temp,
            AttributeKey::MinTemp => &mut self.min_temp,
            AttributeKey::ExtTempDevice => &mut self.ext_temp_device,
            AttributeKey::OverruleMinutes => &mut self.overrule_minutes,
            AttributeKey::RunStatus => &mut self.run_status,
            AttributeKey::SchedulerPlan => &mut self.scheduler_plan,
        }
    }

    /// Sets a slot. A JSON `null` clears it.
    pub fn set(&mut self, key: AttributeKey, value: Value) {
        *self.slot_mut(key) = (!value.is_null()).then_some(value);
    }

    /// Sets a slot by backend key name.
    pub fn set_named(&mut self, key: &str, value: Value) -> Result<AttributeKey, UnknownAttribute> {
        let key = key.parse::<AttributeKey>()?;
        self.set(key, value);
        Ok(key)
    }

    /// Copies every set slot of `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        for key in AttributeKey::ALL {
            if let Some(value) = other.get(key) {
                *self.slot_mut(key) = Some(value.clone());
            }
        }
    }

    /// Number of set slots.
    #[must_use]
    pub fn len(&self) -> usize {
        AttributeKey::ALL
            .into_iter()
            .filter(|key| self.get(*key).is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(key: &str, value: Value) -> AttributeEntry {
        AttributeEntry {
            key: key.to_string(),
            value,
            last_update_ts: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in AttributeKey::ALL {
            assert_eq!(key.as_str().parse::<AttributeKey>().unwrap(), key);
        }
        assert!("firmwareVersion".parse::<AttributeKey>().is_err());
    }

    #[test]
    fn test_from_entries_keeps_only_whitelisted_keys() {
        let attributes = AssetAttributes::from_entries(vec![
            entry("operationalMode", json!("10")),
            entry("maxTemp", json!(25.0)),
            entry("firmwareVersion", json!("1.2.3")),
            entry("childLock", json!(false)),
        ]);

        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes.operational_mode, Some(json!("10")));
        assert_eq!(attributes.max_temp, Some(json!(25.0)));
        assert_eq!(attributes.child_lock, Some(json!(false)));

        let serialized = serde_json::to_value(&attributes).unwrap();
        assert!(serialized.get("firmwareVersion").is_none());
    }

    #[test]
    fn test_null_value_leaves_slot_unset() {
        let attributes = AssetAttributes::from_entries(vec![entry("fixValue", Value::Null)]);
        assert!(attributes.is_empty());
        assert_eq!(serde_json::to_value(&attributes).unwrap(), json!({}));
    }

    #[test]
    fn test_extract_counts_whitelisted_keys_reported_as_null() {
        let (attributes, reported) = AssetAttributes::extract(vec![
            entry("fixValue", Value::Null),
            entry("firmwareVersion", json!("1.2.3")),
        ]);
        assert!(attributes.is_empty());
        assert_eq!(reported, 1);

        let (_, reported) =
            AssetAttributes::extract(vec![entry("firmwareVersion", json!("1.2.3"))]);
        assert_eq!(reported, 0);
    }

    #[test]
    fn test_set_named_rejects_unknown_key() {
        let mut attributes = AssetAttributes::default();
        let err = attributes.set_named("color", json!("red")).unwrap_err();
        assert_eq!(err, UnknownAttribute("color".into()));
        assert!(attributes.is_empty());
    }

    #[test]
    fn test_merge_overwrites_set_slots_only() {
        let mut base = AssetAttributes::default();
        base.set(AttributeKey::MinTemp, json!(18));
        base.set(AttributeKey::RunStatus, json!("idle"));

        let mut update = AssetAttributes::default();
        update.set(AttributeKey::RunStatus, json!("active"));

        base.merge(update);
        assert_eq!(base.min_temp, Some(json!(18)));
        assert_eq!(base.run_status, Some(json!("active")));
    }
}
