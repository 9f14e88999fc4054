//! Ad-hoc filtering for the administrative list surface
//!
//! Parameters map onto window fields. A value starting with `~` is a
//! case-insensitive regular expression, anything else must match exactly.
//! Repeating a parameter ORs its values; different parameters AND.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data::{BlackoutWindow, WindowStatus};

/// Parameters accepted for paging and presentation but not used for filtering
const IGNORED_PARAMS: &[&str] = &["page", "page-size", "sort-by", "reverse", "callback", "_"];

/// Filterable window field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryField {
    Id,
    Environment,
    Service,
    Resource,
    Event,
    Group,
    Tag,
    Customer,
    User,
    Text,
}

impl QueryField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => QueryField::Id,
            "environment" => QueryField::Environment,
            "service" => QueryField::Service,
            "resource" => QueryField::Resource,
            "event" => QueryField::Event,
            "group" => QueryField::Group,
            "tag" | "tags" => QueryField::Tag,
            "customer" => QueryField::Customer,
            "user" => QueryField::User,
            "text" => QueryField::Text,
            _ => return None,
        })
    }

    /// Values of this field on a window; multi-valued fields yield each element
    fn values<'a>(&self, window: &'a BlackoutWindow) -> Vec<&'a str> {
        fn set(values: &Option<std::collections::BTreeSet<String>>) -> Vec<&str> {
            values
                .iter()
                .flat_map(|s| s.iter().map(String::as_str))
                .collect()
        }

        match self {
            QueryField::Id => vec![window.id.as_str()],
            QueryField::Environment => vec![window.environment.as_str()],
            QueryField::Service => set(&window.service),
            QueryField::Tag => set(&window.tags),
            QueryField::Resource => window.resource.as_deref().into_iter().collect(),
            QueryField::Event => window.event.as_deref().into_iter().collect(),
            QueryField::Group => window.group.as_deref().into_iter().collect(),
            QueryField::Customer => window.customer.as_deref().into_iter().collect(),
            QueryField::User => window.user.as_deref().into_iter().collect(),
            QueryField::Text => window.text.as_deref().into_iter().collect(),
        }
    }
}

/// One accepted value for a field
#[derive(Debug, Clone)]
pub enum FieldMatcher {
    Exact(String),
    Pattern(Regex),
}

impl FieldMatcher {
    pub fn parse(value: &str) -> Result<Self, QueryError> {
        match value.strip_prefix('~') {
            Some(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(FieldMatcher::Pattern)
                .map_err(|e| QueryError::InvalidPattern(pattern.to_string(), e.to_string())),
            None => Ok(FieldMatcher::Exact(value.to_string())),
        }
    }

    #[inline]
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            FieldMatcher::Exact(expected) => expected == value,
            FieldMatcher::Pattern(regex) => regex.is_match(value),
        }
    }
}

/// Parsed list filter
#[derive(Debug, Clone, Default)]
pub struct BlackoutQuery {
    fields: BTreeMap<QueryField, Vec<FieldMatcher>>,
    status: Vec<WindowStatus>,
}

impl BlackoutQuery {
    /// Filter that accepts every window
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter from request parameters
    pub fn from_params<I, K, V>(params: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            if IGNORED_PARAMS.contains(&key) {
                continue;
            }
            if key == "status" {
                let status = value
                    .parse::<WindowStatus>()
                    .map_err(|_| QueryError::InvalidStatus(value.to_string()))?;
                query.status.push(status);
                continue;
            }
            let field = QueryField::parse(key)
                .ok_or_else(|| QueryError::UnknownField(key.to_string()))?;
            query
                .fields
                .entry(field)
                .or_default()
                .push(FieldMatcher::parse(value)?);
        }

        Ok(query)
    }

    pub fn with_field(mut self, field: QueryField, matcher: FieldMatcher) -> Self {
        self.fields.entry(field).or_default().push(matcher);
        self
    }

    pub fn with_status(mut self, status: WindowStatus) -> Self {
        self.status.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.status.is_empty()
    }

    /// Whether a window passes every condition at `now`
    pub fn matches(&self, window: &BlackoutWindow, now: DateTime<Utc>) -> bool {
        if !self.status.is_empty() && !self.status.contains(&window.status(now)) {
            return false;
        }

        self.fields.iter().all(|(field, matchers)| {
            let values = field.values(window);
            matchers
                .iter()
                .any(|m| values.iter().any(|v| m.is_match(v)))
        })
    }

    /// Keep the windows that pass, preserving order
    pub fn apply(
        &self,
        windows: Vec<Arc<BlackoutWindow>>,
        now: DateTime<Utc>,
    ) -> Vec<Arc<BlackoutWindow>> {
        if self.is_empty() {
            return windows;
        }
        windows
            .into_iter()
            .filter(|w| self.matches(w, now))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown filter field '{0}'")]
    UnknownField(String),

    #[error("Invalid pattern '{0}': {1}")]
    InvalidPattern(String, String),

    #[error("Invalid status '{0}', expected pending, active or expired")]
    InvalidStatus(String),
}
