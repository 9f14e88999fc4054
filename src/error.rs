use crate::data::WindowError;
use crate::lifecycle::PolicyError;
use crate::query::QueryError;
use crate::storage::StorageError;

/// Errors reported by blackout administration and suppression checks
///
/// Reads and deletes of windows the caller cannot see are `NotFound`,
/// never `Forbidden`, so existence does not leak across customers.
#[derive(Debug, thiserror::Error)]
pub enum BlackoutError {
    #[error("{0}")]
    Validation(String),

    #[error("Blackout '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl From<StorageError> for BlackoutError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => BlackoutError::NotFound(id),
            StorageError::Conflict(_) => BlackoutError::Conflict(err.to_string()),
            StorageError::Invalid(e) => BlackoutError::Validation(e.to_string()),
            StorageError::Timeout(_)
            | StorageError::Persistence(_)
            | StorageError::Backend(_) => BlackoutError::StorageFailure(err.to_string()),
        }
    }
}

impl From<WindowError> for BlackoutError {
    fn from(err: WindowError) -> Self {
        BlackoutError::Validation(err.to_string())
    }
}

impl From<QueryError> for BlackoutError {
    fn from(err: QueryError) -> Self {
        BlackoutError::Validation(err.to_string())
    }
}

impl From<PolicyError> for BlackoutError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Forbidden(_) => BlackoutError::Forbidden(err.to_string()),
            PolicyError::AmbiguousCustomer => BlackoutError::Validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_storage_errors_map_to_failure() {
        let err: BlackoutError = StorageError::Timeout(Duration::from_millis(5)).into();
        assert!(matches!(err, BlackoutError::StorageFailure(_)));

        let err: BlackoutError = StorageError::Backend("down".to_string()).into();
        assert!(matches!(err, BlackoutError::StorageFailure(_)));

        let err: BlackoutError = StorageError::NotFound("x".to_string()).into();
        assert!(matches!(err, BlackoutError::NotFound(id) if id == "x"));

        let err: BlackoutError = StorageError::Conflict("x".to_string()).into();
        assert!(matches!(err, BlackoutError::Conflict(_)));
    }

    #[test]
    fn test_policy_errors() {
        let err: BlackoutError = PolicyError::Forbidden("acme".to_string()).into();
        assert!(matches!(err, BlackoutError::Forbidden(_)));

        let err: BlackoutError = PolicyError::AmbiguousCustomer.into();
        assert!(matches!(err, BlackoutError::Validation(_)));
    }
}
