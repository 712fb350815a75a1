// ── Device domain types ──

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── DeviceId ────────────────────────────────────────────────────────

/// Stable device identifier, unique within the mesh.
///
/// Ordered so that iteration over a [`StateMap`] (and therefore event
/// order) is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── DeviceSnapshot ──────────────────────────────────────────────────

/// One device as observed by a single roster fetch. Lives for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    /// May change between fetches without being an event.
    pub display_name: String,
    pub online: bool,
    /// Provider-supplied; `None` when the directory did not report one.
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn new(device_id: impl Into<DeviceId>, display_name: impl Into<String>, online: bool) -> Self {
        Self {
            device_id: device_id.into(),
            display_name: display_name.into(),
            online,
            last_seen: None,
        }
    }
}

// ── StateRecord ─────────────────────────────────────────────────────

/// Persisted belief about one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub device_id: DeviceId,
    pub display_name: String,
    pub online: bool,
    /// When this record last changed in the store (not provider time).
    pub last_updated: DateTime<Utc>,
}

/// Every device ever seen, keyed and ordered by id.
pub type StateMap = BTreeMap<DeviceId, StateRecord>;
