// ── Notifier ──
//
// Renders transition events and submits them to every configured
// endpoint. Each endpoint gets its own ordered delivery sequence; the
// sequences run concurrently and the notifier waits for all of them.
// A failure is recorded in the report and never propagated.

pub mod render;

use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use meshwatch_api::{Endpoint, Message};

use crate::model::TransitionEvent;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::source::Transport;

// ── DeliveryReport ──────────────────────────────────────────────────

/// How one (message, endpoint) submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Index of the message within the delivered batch.
    pub message: usize,
    /// Redacted endpoint.
    pub endpoint: String,
    pub attempts: u32,
    pub status: DeliveryStatus,
}

/// Per-submission outcomes of one delivery batch, grouped by endpoint in
/// configuration order, messages in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Delivered)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeliveryStatus::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

// ── Notifier ────────────────────────────────────────────────────────

pub struct Notifier<T> {
    transport: T,
    endpoints: Vec<Endpoint>,
    retry: RetryPolicy,
    send_timeout: Duration,
}

impl<T: Transport> Notifier<T> {
    pub fn new(
        transport: T,
        endpoints: Vec<Endpoint>,
        retry: RetryPolicy,
        send_timeout: Duration,
    ) -> Self {
        if endpoints.is_empty() {
            warn!("no notification endpoints configured; transitions will only be logged");
        }
        Self {
            transport,
            endpoints,
            retry,
            send_timeout,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Render and deliver `events` in order to every endpoint.
    pub async fn deliver(&self, events: &[TransitionEvent]) -> DeliveryReport {
        for event in events {
            info!(
                device = %event.device_id,
                name = %event.display_name,
                transition = %event.kind,
                "device transition"
            );
        }
        let messages: Vec<Message> = events.iter().map(render::transition_message).collect();
        self.deliver_messages(&messages).await
    }

    /// Deliver a single ad-hoc message (status report, failure alert).
    pub async fn broadcast(&self, message: &Message) -> DeliveryReport {
        self.deliver_messages(std::slice::from_ref(message)).await
    }

    async fn deliver_messages(&self, messages: &[Message]) -> DeliveryReport {
        if messages.is_empty() || self.endpoints.is_empty() {
            return DeliveryReport::default();
        }

        let per_endpoint = join_all(
            self.endpoints
                .iter()
                .map(|endpoint| self.deliver_to(endpoint, messages)),
        )
        .await;

        let report = DeliveryReport {
            outcomes: per_endpoint.into_iter().flatten().collect(),
        };
        debug!(
            messages = messages.len(),
            endpoints = self.endpoints.len(),
            delivered = report.delivered(),
            "delivery batch complete"
        );
        report
    }

    /// Deliver every message to one endpoint, strictly in order. A failed
    /// message does not stop the ones after it.
    async fn deliver_to(&self, endpoint: &Endpoint, messages: &[Message]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(messages.len());

        for (index, message) in messages.iter().enumerate() {
            let outcome = self
                .retry
                .run("notification delivery", self.send_timeout, || {
                    self.transport.send(endpoint, message)
                })
                .await;

            let attempts = outcome.attempts();
            let status = match outcome {
                RetryOutcome::Succeeded { .. } => {
                    debug!(endpoint = %endpoint, attempts, "notification delivered");
                    DeliveryStatus::Delivered
                }
                RetryOutcome::Exhausted { error, .. } => {
                    warn!(
                        endpoint = %endpoint,
                        attempts,
                        error = %error,
                        title = %message.title,
                        "notification delivery failed"
                    );
                    DeliveryStatus::Failed {
                        error: error.to_string(),
                    }
                }
            };

            outcomes.push(DeliveryOutcome {
                message: index,
                endpoint: endpoint.redacted(),
                attempts,
                status,
            });
        }

        outcomes
    }
}

// ── Tests ────────────────────────────────────────────────────────────
