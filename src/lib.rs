//! Blackout: alert suppression during declared maintenance windows
//!
//! Operators declare blackout windows scoped to an environment and
//! optionally a service, resource, event, group or tag set, owned either by
//! a single customer or globally. Incoming alerts are checked against the
//! windows active at their arrival time; a match suppresses notification.
//!
//! # Features
//!
//! - **Window Store**: Linearizable in-memory store with optional JSON snapshot persistence
//! - **Suppression Evaluator**: Deterministic matching of alerts against active windows
//! - **Lifecycle Guard**: Attribution, customer ownership and audit on create/delete
//! - **Customer Isolation**: One visibility predicate shared by every read and delete
//! - **Retention**: Background purge of long-expired windows
//! - **HTTP API**: axum service for administration and suppression checks
//!
//! # Example
//!
//! ```no_run
//! use blackout::data::{AlertView, BlackoutRequest};
//! use blackout::storage::{MemoryWindowStore, WindowStore};
//! use blackout::suppression::SuppressionEvaluator;
//! use chrono::Utc;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryWindowStore::new());
//! let now = Utc::now();
//!
//! let window = blackout::data::BlackoutWindow::from_request(
//!     "w1",
//!     BlackoutRequest::new("Production").with_service("Web"),
//!     now,
//!     chrono::Duration::hours(1),
//! )?;
//! store.create(window).await?;
//!
//! let evaluator = SuppressionEvaluator::new(Arc::clone(&store), Duration::from_secs(2));
//! let alert = AlertView::new("Production").with_service("Web");
//! assert!(evaluator.is_suppressed(&alert, now).await?.suppressed);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod compaction;
pub mod config;
pub mod data;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod storage;
pub mod suppression;

// Re-export commonly used types
pub use config::ServerConfig;
pub use data::{Actor, AlertView, BlackoutRequest, BlackoutWindow, WindowStatus};
pub use error::BlackoutError;
pub use lifecycle::LifecycleGuard;
pub use storage::{MemoryWindowStore, StorageError, WindowStore};
pub use suppression::{Suppression, SuppressionEvaluator};
