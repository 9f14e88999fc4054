//! Customer visibility shared by every read and delete path

use crate::data::{Actor, BlackoutWindow};

/// Which windows a caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Elevated callers see windows of every customer
    Unrestricted,
    /// Global windows plus windows owned by one of these customers
    Customers(Vec<String>),
}

impl Visibility {
    /// Visibility of an administrative actor
    pub fn for_actor(actor: &Actor, can_manage_any_customer: bool) -> Self {
        if can_manage_any_customer {
            Visibility::Unrestricted
        } else {
            Visibility::Customers(actor.customers.clone())
        }
    }

    /// Visibility of an alert owned by `customer` (None is an untenanted alert)
    pub fn for_customer(customer: Option<&str>) -> Self {
        Visibility::Customers(customer.map(|c| vec![c.to_string()]).unwrap_or_default())
    }

    /// Whether a window owned by `customer` is visible.
    ///
    /// Windows without a customer are global and visible to everyone.
    pub fn allows(&self, customer: Option<&str>) -> bool {
        match (self, customer) {
            (Visibility::Unrestricted, _) => true,
            (Visibility::Customers(_), None) => true,
            (Visibility::Customers(customers), Some(owner)) => {
                customers.iter().any(|c| c == owner)
            }
        }
    }
}

/// Visibility predicate over a window
#[inline]
pub fn visible(window: &BlackoutWindow, visibility: &Visibility) -> bool {
    visibility.allows(window.customer.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Scope;

    #[test]
    fn test_unrestricted_sees_everything() {
        let v = Visibility::Unrestricted;
        assert!(v.allows(None));
        assert!(v.allows(Some("acme")));
    }

    #[test]
    fn test_customer_scoped() {
        let v = Visibility::Customers(vec!["acme".to_string(), "globex".to_string()]);
        assert!(v.allows(None));
        assert!(v.allows(Some("globex")));
        assert!(!v.allows(Some("initech")));
    }

    #[test]
    fn test_untenanted_alert_sees_only_global() {
        let v = Visibility::for_customer(None);
        assert!(v.allows(None));
        assert!(!v.allows(Some("acme")));
    }

    #[test]
    fn test_for_actor() {
        let actor = Actor::new("ops")
            .with_scope(Scope::WriteBlackouts)
            .with_customer("acme");
        assert_eq!(
            Visibility::for_actor(&actor, false),
            Visibility::Customers(vec!["acme".to_string()])
        );
        assert_eq!(Visibility::for_actor(&actor, true), Visibility::Unrestricted);
    }
}
