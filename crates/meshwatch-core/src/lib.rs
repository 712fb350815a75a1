//! State-diffing and notification-dispatch engine for mesh device presence.
//!
//! - **[`Monitor`]**: The poll loop. Each cycle runs
//!   fetch → diff → persist → notify, and a failure in any phase is
//!   contained to that cycle. [`Monitor::run`] repeats until the shutdown
//!   token fires; [`Monitor::run_cycle`] runs exactly one cycle.
//!
//! - **[`StateStore`]**: Durable, single-writer record of the last known
//!   status of every device ever seen. Commits are atomic (temp file +
//!   rename).
//!
//! - **[`diff::compute_transitions`]**: Pure comparison of a roster
//!   snapshot against the stored state, producing ordered
//!   [`TransitionEvent`]s and the next state.
//!
//! - **[`Notifier`]**: Renders events and delivers them to every
//!   configured endpoint with a bounded [`RetryPolicy`].
//!
//! The roster and the notification transport are reached through the
//! [`RosterSource`] and [`Transport`] traits, implemented for the HTTP
//! clients in `meshwatch-api`.

pub mod config;
pub mod convert;
pub mod diff;
pub mod error;
pub mod model;
pub mod monitor;
pub mod notifier;
pub mod retry;
pub mod source;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{MonitorConfig, OnlineMode, OnlinePolicy};
pub use diff::{DiffOutcome, compute_transitions};
pub use error::{CoreError, CycleError};
pub use model::{DeviceId, DeviceSnapshot, StateMap, StateRecord, TransitionEvent, TransitionKind};
pub use monitor::{CyclePhase, CycleReport, LoopSettings, Monitor};
pub use notifier::{DeliveryOutcome, DeliveryReport, DeliveryStatus, Notifier};
pub use retry::{RetryOutcome, RetryPolicy};
pub use source::{DirectoryRoster, RosterSource, Transport};
pub use store::StateStore;

pub use meshwatch_api::roster::DEFAULT_API_BASE;
pub use meshwatch_api::{Endpoint, Message, MessageKind};
