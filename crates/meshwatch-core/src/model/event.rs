// ── Transition events ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::DeviceId;

/// What happened to a device between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransitionKind {
    /// Observed for the first time, online.
    FirstSeen,
    BecameOnline,
    BecameOffline,
}

impl TransitionKind {
    /// Status the device holds after the transition.
    pub fn online(self) -> bool {
        matches!(self, Self::FirstSeen | Self::BecameOnline)
    }
}

/// The unit handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub device_id: DeviceId,
    pub display_name: String,
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
}
