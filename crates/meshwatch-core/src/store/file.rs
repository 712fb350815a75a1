// ── On-disk layout ──
//
// A versioned envelope around the state map so a foreign or truncated
// file is distinguishable from a valid empty one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::StateMap;

pub(super) const FORMAT: &str = "meshwatch-state";
pub(super) const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct StateFile {
    pub format: String,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub devices: StateMap,
}

impl StateFile {
    pub fn new(devices: StateMap, saved_at: DateTime<Utc>) -> Self {
        Self {
            format: FORMAT.into(),
            version: VERSION,
            saved_at,
            devices,
        }
    }

    /// Reject envelopes that parse but are not ours or are inconsistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.format != FORMAT {
            return Err(format!("unexpected format marker {:?}", self.format));
        }
        if self.version != VERSION {
            return Err(format!("unsupported state version {}", self.version));
        }
        if let Some((key, record)) = self.devices.iter().find(|(k, r)| **k != r.device_id) {
            return Err(format!(
                "record keyed {key} claims device id {}",
                record.device_id
            ));
        }
        Ok(())
    }
}
