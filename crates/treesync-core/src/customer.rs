//! Tenant identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;

/// Identifier of the tenant ("customer") a topology belongs to.
///
/// Always a well-formed UUID. Displays in lower-case hyphenated form, which is
/// what the backend and the store expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    /// Parses a customer id, rejecting anything that is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        Uuid::parse_str(raw.trim()).map(Self).map_err(|e| {
            SyncError::validation(format!(
                "Invalid customer_id format '{raw}': must be a valid UUID ({e})"
            ))
        })
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for CustomerId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for CustomerId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
