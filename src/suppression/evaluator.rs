use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::data::{AlertView, BlackoutWindow};
use crate::error::BlackoutError;
use crate::query::matches;
use crate::storage::{bounded, WindowStore};

/// Outcome of a suppression check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suppression {
    pub suppressed: bool,
    /// Ids of every matching window, ordered by start time then id
    pub matched: Vec<String>,
}

impl Suppression {
    pub fn none() -> Self {
        Self {
            suppressed: false,
            matched: Vec::new(),
        }
    }
}

/// Decides whether alerts fall inside an active blackout
pub struct SuppressionEvaluator<S> {
    store: Arc<S>,
    store_timeout: Duration,
}

impl<S: WindowStore> SuppressionEvaluator<S> {
    pub fn new(store: Arc<S>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Check `alert` against the windows visible to its customer at `now`.
    ///
    /// Store failures are returned as errors. They are never reported as
    /// "not suppressed".
    pub async fn is_suppressed(
        &self,
        alert: &AlertView,
        now: DateTime<Utc>,
    ) -> Result<Suppression, BlackoutError> {
        let candidates = bounded(
            self.store_timeout,
            self.store
                .list_active_for_customer(alert.customer.as_deref(), now),
        )
        .await
        .map_err(|e| {
            tracing::error!(
                customer = ?alert.customer,
                environment = %alert.environment,
                error = %e,
                "Failed to load blackouts for suppression check"
            );
            BlackoutError::from(e)
        })?;

        let result = evaluate(alert, &candidates, now);

        if result.suppressed {
            tracing::debug!(
                customer = ?alert.customer,
                environment = %alert.environment,
                resource = ?alert.resource,
                event = ?alert.event,
                windows = ?result.matched,
                "Alert suppressed by blackout"
            );
        }

        Ok(result)
    }
}

/// Pure suppression decision over already-fetched candidate windows.
///
/// Time containment is checked first, then scope. The result does not
/// depend on the order of `windows`.
pub fn evaluate(alert: &AlertView, windows: &[Arc<BlackoutWindow>], now: DateTime<Utc>) -> Suppression {
    let mut matched: Vec<&BlackoutWindow> = windows
        .iter()
        .map(|w| &**w)
        .filter(|w| w.is_active_at(now))
        .filter(|w| matches(alert, w))
        .collect();

    if matched.is_empty() {
        return Suppression::none();
    }

    matched.sort_by(|a, b| (a.start_time, &a.id).cmp(&(b.start_time, &b.id)));
    matched.dedup_by(|a, b| a.id == b.id);

    Suppression {
        suppressed: true,
        matched: matched.into_iter().map(|w| w.id.clone()).collect(),
    }
}
