//! Match predicate between an alert and a blackout window
//!
//! Only scoping dimensions are compared here. Time containment and
//! customer visibility are applied before this check by the caller.

use crate::data::{AlertView, BlackoutWindow};

/// Whether `window`'s scope covers `alert`.
///
/// Every dimension present on the window must agree with the alert;
/// absent dimensions are wildcards. `environment` is always compared.
pub fn matches(alert: &AlertView, window: &BlackoutWindow) -> bool {
    window.environment == alert.environment
        && service_matches(alert, window)
        && field_matches(window.resource.as_deref(), alert.resource.as_deref())
        && field_matches(window.event.as_deref(), alert.event.as_deref())
        && field_matches(window.group.as_deref(), alert.group.as_deref())
        && tags_match(alert, window)
}

/// Exact, case-sensitive equality when the window sets a value
#[inline]
fn field_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => actual == Some(expected),
    }
}

/// Every service named by the window must be among the alert's services
#[inline]
fn service_matches(alert: &AlertView, window: &BlackoutWindow) -> bool {
    match &window.service {
        None => true,
        Some(services) => services.iter().all(|s| alert.service.contains(s)),
    }
}

/// At least one tag in common
#[inline]
fn tags_match(alert: &AlertView, window: &BlackoutWindow) -> bool {
    match &window.tags {
        None => true,
        Some(tags) => !tags.is_disjoint(&alert.tags),
    }
}
