use crate::storage::WindowStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background worker that purges windows expired for longer than the retention period
pub struct RetentionWorker<S> {
    store: Arc<S>,
    retention: chrono::Duration,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl<S: WindowStore> RetentionWorker<S> {
    pub fn new(store: Arc<S>, retention: chrono::Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            // time::interval rejects a zero period
            interval: interval.max(MIN_INTERVAL),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!(
                "Retention worker started with interval {:?}, retention {}h",
                self.interval,
                self.retention.num_hours()
            );

            let mut interval = time::interval(self.interval);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;

                match run_retention(self.store.as_ref(), self.retention).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!("Retention worker purged {} blackouts", purged),
                    Err(e) => tracing::error!(error = %e, "Retention purge failed"),
                }
            }

            tracing::info!("Retention worker stopped");
        })
    }

    /// Stop the worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Purge once (for manual/testing use)
pub async fn run_retention<S: WindowStore>(
    store: &S,
    retention: chrono::Duration,
) -> Result<usize, crate::storage::StorageError> {
    match chrono::Utc::now().checked_sub_signed(retention) {
        Some(cutoff) => store.purge_expired(cutoff).await,
        // Retention reaches past the earliest representable time
        None => Ok(0),
    }
}
