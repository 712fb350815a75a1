//! Configuration for the meshwatch daemon.
//!
//! Layered loading (defaults, TOML file, `MESHWATCH_*` environment, then
//! the variable names of earlier deployments) and translation to
//! `meshwatch_core::MonitorConfig`. Nothing here touches the network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use meshwatch_core::{Endpoint, MonitorConfig, OnlineMode, OnlinePolicy, RetryPolicy};

/// Prefix for environment overrides (`MESHWATCH_POLL_INTERVAL_SECS`, ...).
pub const ENV_PREFIX: &str = "MESHWATCH_";

/// Variable names understood for compatibility with existing container
/// deployments, mapped to their config keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("TAILSCALE_API_KEY", "api_token"),
    ("TAILSCALE_TAILNET", "mesh"),
    ("APPRISE_URLS", "notify_endpoints"),
    ("CHECK_INTERVAL", "poll_interval_secs"),
    ("STATE_FILE", "state_path"),
    ("ONLINE_THRESHOLD_SECONDS", "online_threshold_secs"),
];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required setting '{field}'")]
    Missing { field: String },

    #[error("config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The setting this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::Missing { field } => Some(field),
            Self::NotFound { .. } | Self::Figment(_) | Self::Serialization(_) => None,
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Raw settings as merged from every source, before validation.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Directory API token. Never serialized.
    #[serde(skip_serializing)]
    pub api_token: Option<SecretString>,

    /// Mesh (tailnet) name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,

    pub api_base: String,

    pub poll_interval_secs: u64,

    /// Notification endpoint URIs. Accepts a list, or one comma-separated
    /// string as set from the environment.
    #[serde(deserialize_with = "endpoint_list")]
    pub notify_endpoints: Vec<String>,

    pub state_path: PathBuf,

    pub online_threshold_secs: u64,

    pub online_policy: OnlineMode,

    pub request_timeout_secs: u64,

    pub send_timeout_secs: u64,

    /// Attempts per endpoint delivery, including the first.
    pub retry_attempts: u32,

    pub retry_base_delay_ms: u64,

    pub initial_report: bool,

    pub notify_on_error: bool,

    /// Extra CA certificate for self-hosted endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_token: None,
            mesh: None,
            api_base: meshwatch_core::DEFAULT_API_BASE.into(),
            poll_interval_secs: 60,
            notify_endpoints: Vec::new(),
            state_path: PathBuf::from("/data/device_state.json"),
            online_threshold_secs: 60,
            online_policy: OnlineMode::default(),
            request_timeout_secs: 30,
            send_timeout_secs: 10,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            initial_report: true,
            notify_on_error: false,
            ca_cert: None,
        }
    }
}

fn endpoint_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<String>),
        Joined(String),
    }

    let raw = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(list) => list,
        OneOrMany::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect())
}

impl Settings {
    /// Validate and convert into the core's runtime config.
    pub fn into_monitor_config(self) -> Result<MonitorConfig, ConfigError> {
        let api_token = self
            .api_token
            .filter(|t| !t.expose_secret().trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "api_token".into(),
            })?;
        let mesh = self
            .mesh
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "mesh".into(),
            })?;

        url::Url::parse(&self.api_base)
            .map_err(|e| ConfigError::invalid("api_base", format!("{e}: {}", self.api_base)))?;

        let endpoints = self
            .notify_endpoints
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                Endpoint::parse(raw).map_err(|e| {
                    ConfigError::invalid("notify_endpoints", format!("entry {}: {e}", i + 1))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let poll_interval = positive_secs("poll_interval_secs", self.poll_interval_secs)?;
        let threshold = positive_secs("online_threshold_secs", self.online_threshold_secs)?;
        let request_timeout = positive_secs("request_timeout_secs", self.request_timeout_secs)?;
        let send_timeout = positive_secs("send_timeout_secs", self.send_timeout_secs)?;
        if self.retry_attempts == 0 {
            return Err(ConfigError::invalid("retry_attempts", "must be at least 1"));
        }

        let mut config = MonitorConfig::new(mesh, api_token, self.state_path);
        config.api_base = self.api_base;
        config.poll_interval = poll_interval;
        config.endpoints = endpoints;
        config.online_policy = OnlinePolicy {
            mode: self.online_policy,
            threshold,
        };
        config.request_timeout = request_timeout;
        config.send_timeout = send_timeout;
        config.delivery_retry = RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        };
        config.initial_report = self.initial_report;
        config.notify_on_error = self.notify_on_error;
        config.ca_cert = self.ca_cert;
        Ok(config)
    }
}

impl Settings {
    /// Effective settings as TOML. The API token is never included.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

// ── Config file path ────────────────────────────────────────────────

/// Default config file location via XDG / platform conventions.
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "meshwatch").map(|dirs| dirs.config_dir().join("config.toml"))
}

// ── Loading ─────────────────────────────────────────────────────────

/// The provider stack, lowest precedence first.
///
/// An explicit `path` must exist; the default path is optional.
pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
    let file = match path {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Some(path) => Some(path.to_path_buf()),
        None => config_path(),
    };

    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
    if let Some(file) = file {
        figment = figment.merge(Toml::file(file));
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX)).merge(legacy_env()))
}

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(legacy, _)| key.as_str().eq_ignore_ascii_case(legacy))
            .map(|(_, field)| (*field).into())
    })
}

/// Load merged settings without validating them.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    Ok(figment(path)?.extract()?)
}

/// Load and validate a complete monitor config.
pub fn load_monitor_config(path: Option<&Path>) -> Result<MonitorConfig, ConfigError> {
    load(path)?.into_monitor_config()
}

// ── Tests ────────────────────────────────────────────────────────────
