// ── Poll loop ──
//
// One cycle: Fetching -> Diffing -> Persisting -> Notifying -> Idle.
// Cycles never overlap and the monitor is the only writer of the state
// store, so the in-memory mapping needs no locking. Every cycle failure
// is caught here; nothing short of cancellation stops `run`.

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use meshwatch_api::{NotifyClient, RosterClient, TransportConfig};

use crate::config::MonitorConfig;
use crate::diff::{DiffOutcome, compute_transitions};
use crate::error::{CoreError, CycleError};
use crate::model::{StateMap, TransitionEvent};
use crate::notifier::{DeliveryReport, Notifier, render};
use crate::retry::RetryPolicy;
use crate::source::{DirectoryRoster, RosterSource, Transport};
use crate::store::StateStore;

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where a cycle is, or where it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CyclePhase {
    Fetching,
    Diffing,
    Persisting,
    Notifying,
    Idle,
}

/// Loop timing and optional behaviour.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Spacing between cycle starts.
    pub poll_interval: Duration,
    /// Bound on each roster fetch attempt.
    pub fetch_timeout: Duration,
    pub fetch_retry: RetryPolicy,
    pub initial_report: bool,
    pub notify_on_error: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(30),
            fetch_retry: RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
            initial_report: true,
            notify_on_error: false,
        }
    }
}

impl LoopSettings {
    fn from_config(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            fetch_timeout: config.request_timeout,
            fetch_retry: config.fetch_retry.clone(),
            initial_report: config.initial_report,
            notify_on_error: config.notify_on_error,
        }
    }
}

/// What one successful cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    /// Devices in the fetched roster.
    pub devices: usize,
    pub events: Vec<TransitionEvent>,
    /// Whether the state store was rewritten.
    pub committed: bool,
    /// Startup status report delivery, first successful cycle only.
    pub status_report: Option<DeliveryReport>,
    pub delivery: DeliveryReport,
}

// ── Monitor ─────────────────────────────────────────────────────────

/// Owns the state store and drives the poll cycle.
pub struct Monitor<R, T> {
    roster: R,
    notifier: Notifier<T>,
    store: StateStore,
    state: StateMap,
    settings: LoopSettings,
    cycle: u64,
    reported: bool,
    failing: bool,
}

impl Monitor<DirectoryRoster, NotifyClient> {
    /// Wire the HTTP roster client and notification transport from config.
    pub fn from_config(config: MonitorConfig) -> Result<Self, CoreError> {
        let mut roster_transport = TransportConfig::new(config.request_timeout);
        let mut notify_transport = TransportConfig::new(config.send_timeout);
        if let Some(ca) = &config.ca_cert {
            roster_transport = roster_transport.with_ca_cert(ca.clone());
            notify_transport = notify_transport.with_ca_cert(ca.clone());
        }

        let client = RosterClient::new(&config.api_base, &config.api_token, &roster_transport)
            .map_err(|e| CoreError::Config {
                message: format!("roster client: {e}"),
            })?;
        let notify = NotifyClient::new(&notify_transport).map_err(|e| CoreError::Config {
            message: format!("notification client: {e}"),
        })?;

        let settings = LoopSettings::from_config(&config);
        let roster = DirectoryRoster::new(client, config.mesh, config.online_policy);
        let notifier = Notifier::new(
            notify,
            config.endpoints,
            config.delivery_retry,
            config.send_timeout,
        );

        Ok(Self::new(
            roster,
            notifier,
            StateStore::new(config.state_path),
            settings,
        ))
    }
}

impl<R: RosterSource, T: Transport> Monitor<R, T> {
    /// Load persisted state, quarantining it if unreadable.
    pub fn new(
        roster: R,
        notifier: Notifier<T>,
        store: StateStore,
        settings: LoopSettings,
    ) -> Self {
        let state = store.load_or_recover();
        info!(
            path = %store.path().display(),
            devices = state.len(),
            "state loaded"
        );
        Self {
            roster,
            notifier,
            store,
            state,
            settings,
            cycle: 0,
            reported: false,
            failing: false,
        }
    }

    /// Last committed state.
    pub fn state(&self) -> &StateMap {
        &self.state
    }

    pub fn roster(&self) -> &R {
        &self.roster
    }

    pub fn notifier(&self) -> &Notifier<T> {
        &self.notifier
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Cycle starts are spaced by the poll interval; an overrunning cycle
    /// skips the ticks it missed rather than bursting to catch up.
    pub async fn run(mut self, cancel: CancellationToken) {
        let period = self.settings.poll_interval.max(MIN_POLL_INTERVAL);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = period.as_secs(),
            endpoints = self.notifier.endpoints().len(),
            "monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.run_cycle(&cancel).await {
                        Ok(report) => debug!(
                            cycle = report.cycle,
                            devices = report.devices,
                            events = report.events.len(),
                            committed = report.committed,
                            "cycle complete"
                        ),
                        Err(e) if e.is_cancelled() => {
                            info!(cycle = e.cycle, phase = %e.phase, "shutdown during cycle");
                            break;
                        }
                        Err(e) => warn!(
                            cycle = e.cycle,
                            started_at = %e.started_at.to_rfc3339(),
                            phase = %e.phase,
                            error = %e.source,
                            "cycle failed"
                        ),
                    }
                }
            }
        }

        info!(cycles = self.cycle, "monitor stopped");
    }

    /// Run exactly one cycle.
    ///
    /// Cancellation abandons an in-flight fetch or delivery. A commit that
    /// has started always finishes.
    pub async fn run_cycle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CycleError> {
        self.cycle += 1;
        let cycle = self.cycle;
        let started_at = Utc::now();
        let fail = |phase, source| CycleError {
            cycle,
            started_at,
            phase,
            source,
        };

        // ── Fetching ──
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(fail(CyclePhase::Fetching, CoreError::Cancelled)),
            outcome = self.settings.fetch_retry.run(
                "roster fetch",
                self.settings.fetch_timeout,
                || self.roster.fetch_roster(),
            ) => outcome.into_result(),
        };
        let roster = match fetched {
            Ok(roster) => roster,
            Err(e) => {
                return Err(self.record_failure(fail(CyclePhase::Fetching, e), cancel).await);
            }
        };

        // ── Diffing ──
        let DiffOutcome { state, events } = compute_transitions(&self.state, &roster, Utc::now());

        // ── Persisting ──
        let committed = state != self.state;
        if committed {
            if let Err(e) = self.store.commit(&state) {
                return Err(self.record_failure(fail(CyclePhase::Persisting, e), cancel).await);
            }
            self.state = state;
        }
        self.recovered(cycle);

        // ── Notifying ──
        if cancel.is_cancelled() {
            return Err(fail(CyclePhase::Notifying, CoreError::Cancelled));
        }

        let status_report = if self.settings.initial_report && !self.reported {
            self.reported = true;
            let message = render::status_report(&roster, self.settings.poll_interval);
            let report = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(fail(CyclePhase::Notifying, CoreError::Cancelled)),
                report = self.notifier.broadcast(&message) => report,
            };
            Some(report)
        } else {
            None
        };

        let delivery = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(fail(CyclePhase::Notifying, CoreError::Cancelled)),
            report = self.notifier.deliver(&events) => report,
        };
        if !delivery.is_clean() {
            warn!(
                cycle,
                failed = delivery.failed().count(),
                delivered = delivery.delivered(),
                "some notifications were not delivered"
            );
        }

        Ok(CycleReport {
            cycle,
            devices: roster.len(),
            events,
            committed,
            status_report,
            delivery,
        })
    }

    /// Record a failed cycle, alerting endpoints on the first failure of a
    /// streak when enabled.
    async fn record_failure(&mut self, err: CycleError, cancel: &CancellationToken) -> CycleError {
        if err.is_cancelled() || self.failing {
            return err;
        }
        self.failing = true;

        if self.settings.notify_on_error {
            let message = render::failure_alert(err.phase, &err.source.to_string());
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                _ = self.notifier.broadcast(&message) => {}
            }
        }
        err
    }

    fn recovered(&mut self, cycle: u64) {
        if self.failing {
            self.failing = false;
            info!(cycle, "monitor recovered");
        }
    }
}
