// ── External collaborator seams ──
//
// The poll loop only knows these two traits. Production wiring uses the
// HTTP clients from `meshwatch-api`; tests plug in in-memory fakes.

use std::future::Future;

use chrono::Utc;
use tracing::error;

use meshwatch_api::{Endpoint, Message, NotifyClient, RosterClient};

use crate::config::OnlinePolicy;
use crate::convert::snapshot_from_roster;
use crate::error::CoreError;
use crate::model::DeviceSnapshot;

/// Produces the current roster, one call per cycle.
pub trait RosterSource: Send + Sync {
    fn fetch_roster(&self) -> impl Future<Output = Result<Vec<DeviceSnapshot>, CoreError>> + Send;
}

/// Delivers one message to one endpoint. A single attempt: retries are
/// the notifier's job.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        endpoint: &Endpoint,
        message: &Message,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

// ── Directory-backed roster ─────────────────────────────────────────

/// [`RosterSource`] backed by the provider's device directory.
pub struct DirectoryRoster {
    client: RosterClient,
    mesh: String,
    policy: OnlinePolicy,
}

impl DirectoryRoster {
    pub fn new(client: RosterClient, mesh: impl Into<String>, policy: OnlinePolicy) -> Self {
        Self {
            client,
            mesh: mesh.into(),
            policy,
        }
    }

    pub fn mesh(&self) -> &str {
        &self.mesh
    }
}

impl RosterSource for DirectoryRoster {
    async fn fetch_roster(&self) -> Result<Vec<DeviceSnapshot>, CoreError> {
        let devices = self
            .client
            .list_devices(&self.mesh)
            .await
            .inspect_err(|e| {
                if e.is_auth() {
                    error!(mesh = %self.mesh, "directory rejected the API token");
                }
            })?;
        let now = Utc::now();
        Ok(devices
            .iter()
            .map(|d| snapshot_from_roster(d, &self.policy, now))
            .collect())
    }
}

// ── HTTP transport ──────────────────────────────────────────────────

impl Transport for NotifyClient {
    async fn send(&self, endpoint: &Endpoint, message: &Message) -> Result<(), CoreError> {
        NotifyClient::send(self, endpoint, message)
            .await
            .map_err(|e| CoreError::delivery(endpoint, &e))
    }
}
