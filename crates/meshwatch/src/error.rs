//! CLI error types with miette diagnostics.
//!
//! Startup failures end the process with a non-zero exit code. Failures
//! inside the running monitor never reach this type.

use miette::Diagnostic;
use thiserror::Error;

use meshwatch_config::ConfigError;
use meshwatch_core::{CoreError, CycleError, Endpoint};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const STATE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Missing required setting '{field}'")]
    #[diagnostic(
        code(meshwatch::missing_setting),
        help("Set `{field}` in the config file, or export {env}.")
    )]
    MissingSetting { field: String, env: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshwatch::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid value for notify_endpoints: {reason}")]
    #[diagnostic(
        code(meshwatch::endpoint),
        help("Supported schemes: {schemes}. Other Apprise URLs must be replaced by a webhook or ntfy URL.")
    )]
    Endpoint { reason: String, schemes: String },

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(meshwatch::no_config),
        help("Pass an existing file to --config, or omit it to use the default location.")
    )]
    NoConfig { path: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(meshwatch::config))]
    Config { message: String },

    // ── Startup ──────────────────────────────────────────────────────
    #[error("Could not start the monitor")]
    #[diagnostic(code(meshwatch::startup))]
    Startup {
        #[source]
        source: CoreError,
    },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Poll cycle failed")]
    #[diagnostic(
        code(meshwatch::cycle_failed),
        help("Re-run with -v for per-attempt details.")
    )]
    CycleFailed {
        #[source]
        source: CycleError,
    },

    #[error("State file could not be read")]
    #[diagnostic(
        code(meshwatch::state),
        help("The monitor will move this file aside and start fresh on its next run.")
    )]
    State {
        #[source]
        source: CoreError,
    },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(meshwatch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingSetting { .. }
            | Self::Validation { .. }
            | Self::Endpoint { .. }
            | Self::NoConfig { .. }
            | Self::Config { .. } => exit_code::USAGE,
            Self::State { .. } => exit_code::STATE,
            Self::Startup { .. } | Self::CycleFailed { .. } | Self::Io(_) | Self::Json(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field } => {
                let env = format!(
                    "{}{}",
                    meshwatch_config::ENV_PREFIX,
                    field.to_ascii_uppercase()
                );
                Self::MissingSetting { field, env }
            }
            ConfigError::Validation { field, reason } if field == "notify_endpoints" => {
                Self::Endpoint {
                    reason,
                    schemes: Endpoint::SUPPORTED_SCHEMES.join(", "),
                }
            }
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            other @ (ConfigError::Figment(_) | ConfigError::Serialization(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
