//! Blackout administration: ownership, attribution and audit

pub mod audit;
pub mod guard;
pub mod policy;

pub use audit::{
    AuditDispatcher, AuditError, AuditEvent, AuditKind, AuditSink, AuditStats, AuditStatsSnapshot,
    AuditTarget,
};
pub use guard::{GuardConfig, LifecycleGuard};
pub use policy::{AuthorizationPolicy, PolicyError, ScopePolicy};
