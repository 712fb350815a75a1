// ── Runtime monitor configuration ──
//
// These types describe *what* to watch and *how* to deliver. They carry
// credential data and tuning, but never touch disk. The binary builds a
// `MonitorConfig` (via `meshwatch-config`) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use meshwatch_api::Endpoint;

use crate::retry::RetryPolicy;

/// How a device's online flag is derived from the directory record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineMode {
    /// Trust the directory's `online` flag when present, fall back to
    /// `lastSeen` recency otherwise.
    #[default]
    ReportedOrLastSeen,
    /// Always use `lastSeen` recency.
    LastSeen,
}

/// Online determination rule, see [`crate::convert::snapshot_from_roster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlinePolicy {
    pub mode: OnlineMode,
    /// A device last seen less than this long ago counts as online.
    pub threshold: Duration,
}

impl Default for OnlinePolicy {
    fn default() -> Self {
        Self {
            mode: OnlineMode::default(),
            threshold: Duration::from_secs(60),
        }
    }
}

/// Configuration for one monitor process.
///
/// Built by the binary, passed to [`crate::Monitor::from_config`] -- core
/// never reads config files.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directory API base URL.
    pub api_base: String,
    /// Credential for the roster fetch.
    pub api_token: SecretString,
    /// Target mesh name.
    pub mesh: String,
    /// Spacing between cycle starts.
    pub poll_interval: Duration,
    /// Ordered notification destinations.
    pub endpoints: Vec<Endpoint>,
    /// State store location.
    pub state_path: PathBuf,
    pub online_policy: OnlinePolicy,
    /// HTTP timeout for the roster request (also bounds each fetch attempt).
    pub request_timeout: Duration,
    /// Bound on each endpoint submission attempt.
    pub send_timeout: Duration,
    /// Retry policy for roster fetches.
    pub fetch_retry: RetryPolicy,
    /// Retry policy for endpoint submissions.
    pub delivery_retry: RetryPolicy,
    /// Send a roster summary after the first successful fetch.
    pub initial_report: bool,
    /// Alert endpoints when a cycle starts failing.
    pub notify_on_error: bool,
    /// Extra CA certificate for self-hosted endpoints.
    pub ca_cert: Option<PathBuf>,
}

impl MonitorConfig {
    /// Config with every tunable at its default.
    pub fn new(mesh: impl Into<String>, api_token: SecretString, state_path: PathBuf) -> Self {
        Self {
            api_base: meshwatch_api::roster::DEFAULT_API_BASE.into(),
            api_token,
            mesh: mesh.into(),
            poll_interval: Duration::from_secs(60),
            endpoints: Vec::new(),
            state_path,
            online_policy: OnlinePolicy::default(),
            request_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
            fetch_retry: RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
            delivery_retry: RetryPolicy::default(),
            initial_report: true,
            notify_on_error: false,
            ca_cert: None,
        }
    }
}
