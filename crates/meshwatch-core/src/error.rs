// ── Core error types ──
//
// Errors from meshwatch-core. Transport-layer failures from
// `meshwatch_api` are translated into the phase they occurred in:
// a failed roster query is a `Fetch`, a failed endpoint submission is a
// `Delivery`. Every variant is caught at the poll loop boundary.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::monitor::CyclePhase;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Roster ───────────────────────────────────────────────────────
    #[error("Roster fetch failed: {message}")]
    Fetch { message: String, retryable: bool },

    // ── State store ──────────────────────────────────────────────────
    #[error("Failed to persist state to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {} is corrupt: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },

    // ── Notification ─────────────────────────────────────────────────
    #[error("Delivery to {endpoint} failed: {message}")]
    Delivery {
        endpoint: String,
        message: String,
        retryable: bool,
    },

    // ── Timing / lifecycle ───────────────────────────────────────────
    #[error("{operation} timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Shutdown requested")]
    Cancelled,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether another attempt of the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { retryable, .. } | Self::Delivery { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            Self::Persistence { .. }
            | Self::CorruptState { .. }
            | Self::Cancelled
            | Self::Config { .. } => false,
        }
    }

    /// Translate a transport failure for `endpoint` into a delivery error.
    ///
    /// Client errors (4xx other than 408/429) and malformed endpoints are
    /// permanent; everything else is worth another attempt.
    pub fn delivery(endpoint: &meshwatch_api::Endpoint, err: &meshwatch_api::Error) -> Self {
        use meshwatch_api::Error as Api;

        let retryable = match err {
            Api::UnsupportedScheme(_)
            | Api::InvalidEndpoint { .. }
            | Api::InvalidUrl(_)
            | Api::Tls(_) => false,
            other => match other.status() {
                Some(408 | 429) | None => true,
                Some(status) => status >= 500,
            },
        };

        Self::Delivery {
            endpoint: endpoint.redacted(),
            message: err.to_string(),
            retryable,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<meshwatch_api::Error> for CoreError {
    /// Roster-side conversion: every directory failure is a `Fetch`.
    ///
    /// A 429 is not retried inside the cycle; the next tick is the backoff.
    fn from(err: meshwatch_api::Error) -> Self {
        let retryable = match &err {
            meshwatch_api::Error::RateLimited { .. } => false,
            other => other.is_transient(),
        };
        CoreError::Fetch {
            message: err.to_string(),
            retryable,
        }
    }
}

// ── CycleError ──────────────────────────────────────────────────────

/// A failed poll cycle: which phase broke, and why.
#[derive(Debug, Error)]
#[error("cycle {cycle} failed while {phase}: {source}")]
pub struct CycleError {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub phase: CyclePhase,
    #[source]
    pub source: CoreError,
}

impl CycleError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, CoreError::Cancelled)
    }
}
