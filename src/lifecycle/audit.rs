//! Audit trail for blackout lifecycle events
//!
//! Delivery is fire-and-forget: events are queued and a background task
//! hands them to the configured targets. Dropped and failed deliveries are
//! logged and counted, never returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::data::Actor;

pub const RESOURCE_TYPE: &str = "blackout";

/// Lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
    #[serde(rename = "blackout-created")]
    BlackoutCreated,
    #[serde(rename = "blackout-deleted")]
    BlackoutDeleted,
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event: AuditKind,
    pub user: String,
    pub customers: Vec<String>,
    pub scopes: Vec<String>,
    pub resource_id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Event for an action by `actor` on blackout `resource_id`
    pub fn blackout(
        kind: AuditKind,
        actor: &Actor,
        resource_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event: kind,
            user: actor.user.clone(),
            customers: actor.customers.clone(),
            scopes: actor.scopes.iter().map(|s| s.to_string()).collect(),
            resource_id: resource_id.into(),
            resource_type: RESOURCE_TYPE.to_string(),
            timestamp,
        }
    }
}

/// Receiver of lifecycle events. `record` must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Where audit events are delivered
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditTarget {
    /// Log to tracing
    Log,
    /// HTTP webhook
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct AuditStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditStatsSnapshot {
    pub delivered: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl AuditStats {
    pub fn snapshot(&self) -> AuditStatsSnapshot {
        AuditStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Queue-backed audit sink
pub struct AuditDispatcher {
    tx: mpsc::Sender<AuditEvent>,
    stats: Arc<AuditStats>,
}

impl AuditDispatcher {
    /// Start the delivery task. It runs until every dispatcher handle is dropped.
    pub fn start(targets: Vec<AuditTarget>, capacity: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let (dispatcher, mut rx) = Self::channel(capacity);
        let stats = Arc::clone(&dispatcher.stats);
        let delivery = AuditDelivery::new(targets);

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match delivery.deliver(&event).await {
                    Ok(()) => {
                        stats.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            resource_id = %event.resource_id,
                            event = ?event.event,
                            error = %e,
                            "Failed to deliver audit event"
                        );
                    }
                }
            }
            tracing::info!("Audit dispatcher stopped");
        });

        (dispatcher, handle)
    }

    fn channel(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dispatcher = Self {
            tx,
            stats: Arc::new(AuditStats::default()),
        };
        (dispatcher, rx)
    }

    pub fn stats(&self) -> Arc<AuditStats> {
        Arc::clone(&self.stats)
    }
}

impl AuditSink for AuditDispatcher {
    fn record(&self, event: AuditEvent) {
        let (reason, event) = match self.tx.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => ("queue full", event),
            Err(TrySendError::Closed(event)) => ("dispatcher stopped", event),
        };

        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            resource_id = %event.resource_id,
            event = ?event.event,
            "Dropped audit event: {}",
            reason
        );
    }
}

/// Sends events to every target
struct AuditDelivery {
    client: reqwest::Client,
    targets: Vec<AuditTarget>,
}

impl AuditDelivery {
    fn new(targets: Vec<AuditTarget>) -> Self {
        Self {
            client: reqwest::Client::new(),
            targets,
        }
    }

    async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut errors = Vec::new();

        for target in &self.targets {
            if let Err(e) = self.deliver_to(target, event).await {
                errors.push(e);
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(AuditError::Multiple(errors)),
        }
    }

    async fn deliver_to(&self, target: &AuditTarget, event: &AuditEvent) -> Result<(), AuditError> {
        match target {
            AuditTarget::Log => {
                tracing::info!(
                    target: "blackout::audit",
                    event = ?event.event,
                    user = %event.user,
                    customers = ?event.customers,
                    scopes = ?event.scopes,
                    resource_id = %event.resource_id,
                    resource_type = %event.resource_type,
                    "Audit"
                );
                Ok(())
            }
            AuditTarget::Webhook { url, headers } => {
                let mut request = self.client.post(url).json(event);
                for (key, value) in headers {
                    request = request.header(key, value);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| AuditError::Webhook(format!("Failed to send webhook: {}", e)))?;

                if !response.status().is_success() {
                    return Err(AuditError::Webhook(format!(
                        "Webhook returned status {}",
                        response.status()
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Multiple audit delivery failures: {0:?}")]
    Multiple(Vec<AuditError>),
}

/// Sink that keeps events in memory for assertions
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: parking_lot::Mutex<Vec<AuditEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl AuditSink for RecordingSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
