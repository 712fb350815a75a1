// ── Domain model ──
//
// Canonical types shared by the diff engine, the state store and the
// notifier. Nothing here performs I/O.

pub mod device;
pub mod event;

pub use device::{DeviceId, DeviceSnapshot, StateMap, StateRecord};
pub use event::{TransitionEvent, TransitionKind};
