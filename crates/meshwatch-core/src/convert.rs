// ── API-to-domain type conversions ──
//
// Bridges raw `meshwatch_api` roster records into `DeviceSnapshot`s.
// The online flag is decided here, once, so the diff engine only ever
// compares booleans.

use chrono::{DateTime, TimeDelta, Utc};

use meshwatch_api::RosterDevice;

use crate::config::{OnlineMode, OnlinePolicy};
use crate::model::DeviceSnapshot;

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an RFC 3339 timestamp, silently dropping unparseable values.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// `true` if `last_seen` lies within `policy.threshold` of `now`.
/// Timestamps in the future (clock skew) count as recent.
fn seen_recently(last_seen: Option<DateTime<Utc>>, policy: &OnlinePolicy, now: DateTime<Utc>) -> bool {
    let Some(last_seen) = last_seen else {
        return false;
    };
    let threshold = TimeDelta::from_std(policy.threshold).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(last_seen) < threshold
}

// ── Roster conversion ──────────────────────────────────────────────

/// Convert one directory record into a snapshot observed at `now`.
pub fn snapshot_from_roster(
    device: &RosterDevice,
    policy: &OnlinePolicy,
    now: DateTime<Utc>,
) -> DeviceSnapshot {
    let last_seen = parse_timestamp(device.last_seen.as_deref());

    let online = match (policy.mode, device.online) {
        (OnlineMode::ReportedOrLastSeen, Some(reported)) => reported,
        (OnlineMode::ReportedOrLastSeen, None) | (OnlineMode::LastSeen, _) => {
            seen_recently(last_seen, policy, now)
        }
    };

    DeviceSnapshot {
        device_id: device.id.clone().into(),
        display_name: device.display_name().to_owned(),
        online,
        last_seen,
    }
}
