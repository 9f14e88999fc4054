//! Customer assignment for new blackouts

use crate::data::Actor;

/// Decides which customer owns a new window and who may act across customers
pub trait AuthorizationPolicy: Send + Sync {
    /// Resolve the owning customer for a window requested by `actor`.
    /// `Ok(None)` makes the window global.
    fn resolve_customer(
        &self,
        requested: Option<&str>,
        actor: &Actor,
    ) -> Result<Option<String>, PolicyError>;

    /// Whether `actor` may see and manage windows of every customer
    fn can_manage_any_customer(&self, actor: &Actor) -> bool;
}

/// Scope-based policy: `admin` and `admin:blackouts` act for any customer,
/// everyone else is confined to their own customers
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopePolicy;

impl AuthorizationPolicy for ScopePolicy {
    fn resolve_customer(
        &self,
        requested: Option<&str>,
        actor: &Actor,
    ) -> Result<Option<String>, PolicyError> {
        if let Some(wanted) = requested.filter(|c| !c.is_empty()) {
            if self.can_manage_any_customer(actor) || actor.customers.iter().any(|c| c == wanted) {
                return Ok(Some(wanted.to_string()));
            }
            return Err(PolicyError::Forbidden(wanted.to_string()));
        }

        match actor.customers.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.clone())),
            _ => Err(PolicyError::AmbiguousCustomer),
        }
    }

    fn can_manage_any_customer(&self, actor: &Actor) -> bool {
        actor.is_blackout_admin()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("Not allowed to set customer to '{0}'")]
    Forbidden(String),

    #[error("Must define customer as more than one possibility")]
    AmbiguousCustomer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Scope;

    #[test]
    fn test_admin_may_set_any_customer() {
        let admin = Actor::new("root").with_scope(Scope::AdminBlackouts);
        assert_eq!(
            ScopePolicy.resolve_customer(Some("globex"), &admin),
            Ok(Some("globex".to_string()))
        );
        assert_eq!(ScopePolicy.resolve_customer(None, &admin), Ok(None));
    }

    #[test]
    fn test_user_confined_to_own_customers() {
        let user = Actor::new("alice")
            .with_scope(Scope::WriteBlackouts)
            .with_customer("acme");

        assert_eq!(
            ScopePolicy.resolve_customer(Some("acme"), &user),
            Ok(Some("acme".to_string()))
        );
        assert_eq!(
            ScopePolicy.resolve_customer(Some("globex"), &user),
            Err(PolicyError::Forbidden("globex".to_string()))
        );
        assert_eq!(
            ScopePolicy.resolve_customer(None, &user),
            Ok(Some("acme".to_string()))
        );
    }

    #[test]
    fn test_multiple_customers_require_choice() {
        let user = Actor::new("bob").with_customer("acme").with_customer("globex");
        assert_eq!(
            ScopePolicy.resolve_customer(None, &user),
            Err(PolicyError::AmbiguousCustomer)
        );
        assert_eq!(
            ScopePolicy.resolve_customer(Some("globex"), &user),
            Ok(Some("globex".to_string()))
        );
    }

    #[test]
    fn test_untenanted_user_creates_global_windows() {
        let user = Actor::new("carol").with_scope(Scope::WriteBlackouts);
        assert_eq!(ScopePolicy.resolve_customer(None, &user), Ok(None));
        assert!(!ScopePolicy.can_manage_any_customer(&user));
    }
}
