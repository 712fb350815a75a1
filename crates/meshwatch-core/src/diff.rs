// ── Diff engine ──
//
// Pure comparison of a roster snapshot against the stored state. No I/O,
// no clock: the cycle timestamp is passed in.

use chrono::{DateTime, Utc};

use crate::model::{DeviceSnapshot, StateMap, StateRecord, TransitionEvent, TransitionKind};

/// Next state plus the events that lead to it, in device-id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutcome {
    pub state: StateMap,
    pub events: Vec<TransitionEvent>,
}

/// Compare `current` against `previous` at time `now`.
///
/// - A device absent from `previous` is recorded; it yields
///   [`TransitionKind::FirstSeen`] only if it is online.
/// - A known device whose `online` flag flipped yields
///   [`TransitionKind::BecameOnline`] / [`TransitionKind::BecameOffline`].
/// - A known, unchanged device yields nothing; a new display name is
///   still recorded.
/// - Devices missing from `current` are kept as-is. An empty `current`
///   therefore leaves the state untouched.
pub fn compute_transitions(
    previous: &StateMap,
    current: &[DeviceSnapshot],
    now: DateTime<Utc>,
) -> DiffOutcome {
    let mut observed: Vec<&DeviceSnapshot> = current.iter().collect();
    // Stable: duplicate ids keep roster order, the later entry wins.
    observed.sort_by(|a, b| a.device_id.cmp(&b.device_id));

    let mut state = previous.clone();
    let mut events = Vec::new();

    for snap in observed {
        match state.get_mut(&snap.device_id) {
            None => {
                if snap.online {
                    events.push(event(snap, TransitionKind::FirstSeen, now));
                }
                state.insert(
                    snap.device_id.clone(),
                    StateRecord {
                        device_id: snap.device_id.clone(),
                        display_name: snap.display_name.clone(),
                        online: snap.online,
                        last_updated: now,
                    },
                );
            }
            Some(record) if record.online != snap.online => {
                let kind = if snap.online {
                    TransitionKind::BecameOnline
                } else {
                    TransitionKind::BecameOffline
                };
                events.push(event(snap, kind, now));
                record.online = snap.online;
                record.display_name.clone_from(&snap.display_name);
                record.last_updated = now;
            }
            Some(record) => {
                if record.display_name != snap.display_name {
                    record.display_name.clone_from(&snap.display_name);
                    record.last_updated = now;
                }
            }
        }
    }

    DiffOutcome { state, events }
}

fn event(snap: &DeviceSnapshot, kind: TransitionKind, now: DateTime<Utc>) -> TransitionEvent {
    TransitionEvent {
        device_id: snap.device_id.clone(),
        display_name: snap.display_name.clone(),
        kind,
        timestamp: now,
    }
}
