use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::audit::{AuditEvent, AuditKind, AuditSink};
use super::policy::AuthorizationPolicy;
use crate::data::{Actor, BlackoutRequest, BlackoutWindow, DEFAULT_DURATION_SECS};
use crate::error::BlackoutError;
use crate::query::BlackoutQuery;
use crate::storage::{bounded, StorageError, Visibility, WindowStore};

/// Guard settings
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Length applied when a request gives neither end time nor duration
    pub default_duration: chrono::Duration,
    /// Deadline for each store call
    pub store_timeout: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            default_duration: chrono::Duration::seconds(DEFAULT_DURATION_SECS),
            store_timeout: Duration::from_secs(2),
        }
    }
}

/// Administrative entry point for blackout windows
///
/// Applies attribution and customer ownership on create, customer
/// visibility on every read and delete, and emits one audit event per
/// successful create or delete.
pub struct LifecycleGuard<S> {
    store: Arc<S>,
    policy: Arc<dyn AuthorizationPolicy>,
    audit: Arc<dyn AuditSink>,
    config: GuardConfig,
}

impl<S: WindowStore> LifecycleGuard<S> {
    pub fn new(
        store: Arc<S>,
        policy: Arc<dyn AuthorizationPolicy>,
        audit: Arc<dyn AuditSink>,
        config: GuardConfig,
    ) -> Self {
        Self {
            store,
            policy,
            audit,
            config,
        }
    }

    /// Validate, normalize and persist a new window on behalf of `actor`
    pub async fn create(
        &self,
        actor: &Actor,
        mut request: BlackoutRequest,
        now: DateTime<Utc>,
    ) -> Result<BlackoutWindow, BlackoutError> {
        // Only blackout admins may attribute a window to someone else
        request.user = if actor.is_blackout_admin() {
            request
                .user
                .filter(|u| !u.trim().is_empty())
                .or_else(|| Some(actor.user.clone()))
        } else {
            Some(actor.user.clone())
        };
        request.customer = self
            .policy
            .resolve_customer(request.customer.as_deref(), actor)?;

        let window = BlackoutWindow::from_request(
            Uuid::new_v4().to_string(),
            request,
            now,
            self.config.default_duration,
        )?;

        let store = Arc::clone(&self.store);
        let audit = Arc::clone(&self.audit);
        let actor = actor.clone();
        let stored = window.clone();
        let write = tokio::spawn(async move {
            let id = store.create(stored.clone()).await?;

            tracing::info!(
                blackout_id = %id,
                customer = ?stored.customer,
                environment = %stored.environment,
                user = %actor.user,
                start = %stored.start_time,
                end = %stored.end_time,
                "Blackout created"
            );
            audit.record(AuditEvent::blackout(AuditKind::BlackoutCreated, &actor, id, now));
            Ok::<_, StorageError>(())
        });
        bounded(self.config.store_timeout, joined(write)).await?;

        Ok(window)
    }

    /// Fetch one window visible to `actor`
    pub async fn get(&self, actor: &Actor, id: &str) -> Result<Arc<BlackoutWindow>, BlackoutError> {
        let visibility = self.visibility(actor);
        Ok(bounded(self.config.store_timeout, self.store.get(id, &visibility)).await?)
    }

    /// Windows visible to `actor` that pass `query`, ordered by start time
    pub async fn list(
        &self,
        actor: &Actor,
        query: &BlackoutQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Arc<BlackoutWindow>>, BlackoutError> {
        let visibility = self.visibility(actor);
        let windows = bounded(self.config.store_timeout, self.store.list(&visibility)).await?;
        Ok(query.apply(windows, now))
    }

    /// Delete a window visible to `actor`. Invisible windows are `NotFound`.
    pub async fn delete(&self, actor: &Actor, id: &str, now: DateTime<Utc>) -> Result<(), BlackoutError> {
        let visibility = self.visibility(actor);
        let store = Arc::clone(&self.store);
        let audit = Arc::clone(&self.audit);
        let actor = actor.clone();
        let id = id.to_string();
        let write = tokio::spawn(async move {
            store.delete(&id, &visibility).await?;

            tracing::info!(blackout_id = %id, user = %actor.user, "Blackout deleted");
            audit.record(AuditEvent::blackout(AuditKind::BlackoutDeleted, &actor, id, now));
            Ok::<_, StorageError>(())
        });
        bounded(self.config.store_timeout, joined(write)).await?;

        Ok(())
    }

    fn visibility(&self, actor: &Actor) -> Visibility {
        Visibility::for_actor(actor, self.policy.can_manage_any_customer(actor))
    }
}

/// Await a spawned write. Dropping the returned future detaches the task
/// instead of cancelling it, so a write that lands is always audited.
async fn joined(write: JoinHandle<Result<(), StorageError>>) -> Result<(), StorageError> {
    write
        .await
        .map_err(|e| StorageError::Backend(format!("Write task failed: {}", e)))?
}
