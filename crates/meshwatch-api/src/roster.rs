// Async HTTP client for the mesh provider's device directory.
//
// Endpoint: GET {base}/api/v2/tailnet/{mesh}/devices
// Auth: Authorization: Bearer {token}

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default public directory base URL.
pub const DEFAULT_API_BASE: &str = "https://api.tailscale.com";

// ── Response types ───────────────────────────────────────────────────

/// Envelope of `GET /api/v2/tailnet/{mesh}/devices`.
#[derive(Debug, Clone, Deserialize)]
struct DeviceListResponse {
    #[serde(default)]
    devices: Vec<RosterDevice>,
}

/// One device as reported by the directory. Only the fields the monitor
/// consumes are modelled; everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterDevice {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Explicit connectivity flag. Only present on some API versions.
    #[serde(default)]
    pub online: Option<bool>,
    /// RFC 3339 timestamp, kept raw so an unparseable value degrades to
    /// "offline" instead of failing the whole roster.
    #[serde(default)]
    pub last_seen: Option<String>,
}

impl RosterDevice {
    /// `name`, else `hostname`, else `"Unknown"`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.hostname.as_deref().filter(|h| !h.is_empty()))
            .unwrap_or("Unknown")
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the device directory.
pub struct RosterClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RosterClient {
    /// Build from an API token and transport config.
    ///
    /// Injects `Authorization: Bearer …` as a sensitive default header.
    pub fn new(
        base_url: &str,
        api_token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", api_token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid API token header value: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Build `{base}/api/v2/tailnet/{mesh}/devices`, percent-encoding the
    /// mesh name as a single path segment.
    fn devices_url(&self, mesh: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["api", "v2", "tailnet", mesh, "devices"]);
        Ok(url)
    }

    /// Fetch the full device roster of `mesh`.
    pub async fn list_devices(&self, mesh: &str) -> Result<Vec<RosterDevice>, Error> {
        let url = self.devices_url(mesh)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let page: DeviceListResponse = self.handle_response(resp).await?;
        debug!(count = page.devices.len(), "roster fetched");
        Ok(page.devices)
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Error::InvalidApiKey;
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Error::RateLimited { retry_after_secs };
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> RosterClient {
        RosterClient::new(
            base,
            &SecretString::from("tskey-test"),
            &TransportConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn devices_url_appends_segments() {
        let url = client("https://api.example.net").devices_url("example.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.net/api/v2/tailnet/example.com/devices"
        );
    }

    #[test]
    fn devices_url_keeps_base_path_and_encodes_mesh() {
        let url = client("http://127.0.0.1:9000/proxy/").devices_url("my mesh").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/proxy/api/v2/tailnet/my%20mesh/devices"
        );
    }

    #[test]
    fn display_name_falls_back_to_hostname() {
        let device: RosterDevice =
            serde_json::from_str(r#"{"id":"n1","name":"","hostname":"laptop"}"#).unwrap();
        assert_eq!(device.display_name(), "laptop");

        let bare: RosterDevice = serde_json::from_str(r#"{"id":"n2"}"#).unwrap();
        assert_eq!(bare.display_name(), "Unknown");
    }
}
