use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Permission scopes relevant to blackout administration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "admin:blackouts")]
    AdminBlackouts,
    #[serde(rename = "read:blackouts")]
    ReadBlackouts,
    #[serde(rename = "write:blackouts")]
    WriteBlackouts,
}

impl Scope {
    /// Parse a scope name, returning None for scopes this engine ignores
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "admin" => Some(Scope::Admin),
            "admin:blackouts" => Some(Scope::AdminBlackouts),
            "read:blackouts" => Some(Scope::ReadBlackouts),
            "write:blackouts" => Some(Scope::WriteBlackouts),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Admin => "admin",
            Scope::AdminBlackouts => "admin:blackouts",
            Scope::ReadBlackouts => "read:blackouts",
            Scope::WriteBlackouts => "write:blackouts",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an administrative operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user: String,
    pub scopes: BTreeSet<Scope>,
    /// Customers the actor may see; empty means the actor is not bound to a tenant
    pub customers: Vec<String>,
}

impl Actor {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            scopes: BTreeSet::new(),
            customers: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.insert(scope);
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customers.push(customer.into());
        self
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Holds `admin` or `admin:blackouts`
    pub fn is_blackout_admin(&self) -> bool {
        self.has_scope(Scope::Admin) || self.has_scope(Scope::AdminBlackouts)
    }
}
