use thiserror::Error;

/// Top-level error type for the `meshwatch-api` crate.
///
/// Covers both outbound surfaces: the roster directory query and
/// notification delivery. `meshwatch-core` maps these into cycle errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// API token rejected by the directory (HTTP 401/403).
    #[error("Invalid API token")]
    InvalidApiKey,

    /// Token could not be turned into a header value.
    #[error("Authentication setup failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by the directory. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Directory API ───────────────────────────────────────────────
    /// Non-success response from the roster directory.
    #[error("Directory API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Notification endpoints ──────────────────────────────────────
    /// Endpoint URI uses a scheme no transport understands.
    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    /// Endpoint URI is structurally unusable (missing host, topic, ...).
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Endpoint answered with a non-success status.
    #[error("Delivery to {endpoint} rejected (HTTP {status}): {message}")]
    Delivery {
        endpoint: String,
        status: u16,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the token was rejected and retrying cannot help.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::InvalidApiKey | Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } | Self::Delivery { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } | Self::Delivery { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}
