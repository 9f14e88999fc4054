use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default blackout length when neither end time nor duration is given (1 hour)
pub const DEFAULT_DURATION_SECS: i64 = 3600;

/// Blackout definition as submitted by an administrator, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutRequest {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Length in seconds, used only when `end_time` is absent
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl BlackoutRequest {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: Some(environment.into()),
            ..Default::default()
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service.push(service.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    pub fn with_duration(mut self, secs: i64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A normalized, immutable blackout window
///
/// Windows are never edited in place: a change is a delete followed by a
/// new create. The status is not stored; see [`BlackoutWindow::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutWindow {
    pub id: String,
    pub customer: Option<String>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole seconds, always `end_time - start_time`
    pub duration: i64,
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub create_time: DateTime<Utc>,
}

impl BlackoutWindow {
    /// Normalize a request into a window.
    ///
    /// `start_time` defaults to `now`. An explicit `end_time` wins over
    /// `duration`; with neither, `default_duration` applies.
    pub fn from_request(
        id: impl Into<String>,
        request: BlackoutRequest,
        now: DateTime<Utc>,
        default_duration: Duration,
    ) -> Result<Self, WindowError> {
        let environment = match request.environment {
            Some(env) if !env.trim().is_empty() => env,
            Some(_) => return Err(WindowError::EmptyField("environment")),
            None => return Err(WindowError::MissingEnvironment),
        };

        let start_time = request.start_time.unwrap_or(now);
        let end_time = match (request.end_time, request.duration) {
            (Some(end), _) => end,
            (None, Some(secs)) => {
                if secs <= 0 {
                    return Err(WindowError::InvalidDuration(secs));
                }
                Duration::try_seconds(secs)
                    .and_then(|d| start_time.checked_add_signed(d))
                    .ok_or(WindowError::InvalidDuration(secs))?
            }
            (None, None) => start_time
                .checked_add_signed(default_duration)
                .ok_or(WindowError::InvalidDuration(default_duration.num_seconds()))?,
        };

        let window = Self {
            id: id.into(),
            customer: request.customer,
            environment,
            service: into_set(request.service),
            resource: non_blank(request.resource, "resource")?,
            event: non_blank(request.event, "event")?,
            group: non_blank(request.group, "group")?,
            tags: into_set(request.tags),
            start_time,
            end_time,
            duration: (end_time - start_time).num_seconds(),
            user: request.user,
            text: request.text,
            create_time: now,
        };
        window.validate()?;
        Ok(window)
    }

    /// Check the structural invariants of a window
    pub fn validate(&self) -> Result<(), WindowError> {
        if self.environment.trim().is_empty() {
            return Err(WindowError::MissingEnvironment);
        }
        if self.start_time >= self.end_time {
            return Err(WindowError::InvalidRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.service.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(WindowError::EmptyField("service"));
        }
        if self.tags.as_ref().is_some_and(|t| t.is_empty()) {
            return Err(WindowError::EmptyField("tags"));
        }
        Ok(())
    }

    /// Derived status at `now`. The start instant is active, the end instant is expired.
    pub fn status(&self, now: DateTime<Utc>) -> WindowStatus {
        if now < self.start_time {
            WindowStatus::Pending
        } else if now < self.end_time {
            WindowStatus::Active
        } else {
            WindowStatus::Expired
        }
    }

    /// True when `now` lies within `[start_time, end_time)`
    #[inline]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    /// Seconds left before the window stops suppressing
    pub fn remaining(&self, now: DateTime<Utc>) -> i64 {
        match self.status(now) {
            WindowStatus::Pending => self.duration,
            WindowStatus::Active => (self.end_time - now).num_seconds(),
            WindowStatus::Expired => 0,
        }
    }
}

fn into_set(values: Vec<String>) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = values
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

fn non_blank(value: Option<String>, field: &'static str) -> Result<Option<String>, WindowError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(WindowError::EmptyField(field)),
        other => Ok(other),
    }
}

/// Status of a window relative to a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowStatus {
    Pending,
    Active,
    Expired,
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowStatus::Pending => write!(f, "pending"),
            WindowStatus::Active => write!(f, "active"),
            WindowStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for WindowStatus {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(WindowStatus::Pending),
            "active" => Ok(WindowStatus::Active),
            "expired" => Ok(WindowStatus::Expired),
            other => Err(WindowError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WindowError {
    #[error("Missing mandatory value for 'environment'")]
    MissingEnvironment,

    #[error("Value for '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Start time {start} must be before end time {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Duration must be a positive number of seconds, got {0}")]
    InvalidDuration(i64),

    #[error("Unknown blackout status '{0}'")]
    UnknownStatus(String),
}
