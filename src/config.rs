//! Server configuration from the environment
//!
//! - BLACKOUT_HOST: Bind address (default: 0.0.0.0)
//! - BLACKOUT_PORT: Port number (default: 8080)
//! - BLACKOUT_DATA_DIR: Snapshot directory (default: unset, in-memory only)
//! - BLACKOUT_DEFAULT_DURATION_SECS: Length of blackouts without end time (default: 3600)
//! - BLACKOUT_STORE_TIMEOUT_MS: Deadline for each store call (default: 2000)
//! - BLACKOUT_AUDIT_WEBHOOK_URL: Audit webhook (default: unset, log only)
//! - BLACKOUT_AUDIT_QUEUE: Audit queue capacity (default: 1024)
//! - BLACKOUT_RETENTION_HOURS: Purge blackouts expired longer than this (default: unset, keep)
//! - BLACKOUT_RETENTION_CHECK_SECS: Retention check interval (default: 300)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::data::DEFAULT_DURATION_SECS;
use crate::lifecycle::{AuditTarget, GuardConfig};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub default_duration_secs: i64,
    pub store_timeout_ms: u64,
    pub audit_webhook_url: Option<String>,
    pub audit_queue_capacity: usize,
    pub retention_hours: Option<i64>,
    pub retention_check_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: None,
            default_duration_secs: DEFAULT_DURATION_SECS,
            store_timeout_ms: 2000,
            audit_webhook_url: None,
            audit_queue_capacity: 1024,
            retention_hours: None,
            retention_check_interval_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Read configuration from `BLACKOUT_*` variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("BLACKOUT_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "BLACKOUT_PORT", defaults.port),
            data_dir: non_empty("BLACKOUT_DATA_DIR").map(PathBuf::from),
            default_duration_secs: Some(parse_or(
                &lookup,
                "BLACKOUT_DEFAULT_DURATION_SECS",
                defaults.default_duration_secs,
            ))
            .filter(|secs| *secs > 0 && chrono::Duration::try_seconds(*secs).is_some())
            .unwrap_or(defaults.default_duration_secs),
            store_timeout_ms: parse_or(&lookup, "BLACKOUT_STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            audit_webhook_url: non_empty("BLACKOUT_AUDIT_WEBHOOK_URL"),
            audit_queue_capacity: parse_or(&lookup, "BLACKOUT_AUDIT_QUEUE", defaults.audit_queue_capacity),
            retention_hours: lookup("BLACKOUT_RETENTION_HOURS")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|h| *h > 0 && chrono::Duration::try_hours(*h).is_some()),
            // A zero interval would stall the retention timer
            retention_check_interval_secs: parse_or(
                &lookup,
                "BLACKOUT_RETENTION_CHECK_SECS",
                defaults.retention_check_interval_secs,
            )
            .max(1),
        }
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            default_duration: chrono::Duration::try_seconds(self.default_duration_secs)
                .filter(|d| *d > chrono::Duration::zero())
                .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_DURATION_SECS)),
            store_timeout: self.store_timeout(),
        }
    }

    /// How long expired windows are kept, `None` keeps them forever
    pub fn retention(&self) -> Option<chrono::Duration> {
        self.retention_hours
            .filter(|h| *h > 0)
            .and_then(chrono::Duration::try_hours)
    }

    pub fn retention_check_interval(&self) -> Duration {
        Duration::from_secs(self.retention_check_interval_secs.max(1))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn audit_targets(&self) -> Vec<AuditTarget> {
        let mut targets = vec![AuditTarget::Log];
        if let Some(url) = &self.audit_webhook_url {
            targets.push(AuditTarget::Webhook {
                url: url.clone(),
                headers: Default::default(),
            });
        }
        targets
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_duration_secs, 3600);
        assert!(config.data_dir.is_none());
        assert!(config.retention_hours.is_none());
        assert_eq!(config.audit_targets().len(), 1);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BLACKOUT_PORT", "9090"),
            ("BLACKOUT_DATA_DIR", "/var/lib/blackout"),
            ("BLACKOUT_DEFAULT_DURATION_SECS", "600"),
            ("BLACKOUT_STORE_TIMEOUT_MS", "250"),
            ("BLACKOUT_AUDIT_WEBHOOK_URL", "http://audit.local/events"),
            ("BLACKOUT_RETENTION_HOURS", "72"),
        ]);

        assert_eq!(config.port, 9090);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/blackout")));
        assert_eq!(config.guard_config().default_duration, chrono::Duration::seconds(600));
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        assert_eq!(config.retention_hours, Some(72));
        assert_eq!(config.audit_targets().len(), 2);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("BLACKOUT_PORT", "not-a-port"),
            ("BLACKOUT_DEFAULT_DURATION_SECS", "-5"),
            ("BLACKOUT_RETENTION_HOURS", "0"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.default_duration_secs, 3600);
        assert!(config.retention_hours.is_none());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = config_from(&[
            ("BLACKOUT_DEFAULT_DURATION_SECS", "9223372036854775807"),
            ("BLACKOUT_RETENTION_HOURS", "9223372036854775807"),
            ("BLACKOUT_RETENTION_CHECK_SECS", "0"),
        ]);

        assert_eq!(config.default_duration_secs, 3600);
        assert!(config.retention_hours.is_none());
        assert!(config.retention().is_none());
        assert_eq!(config.retention_check_interval_secs, 1);
        assert_eq!(config.retention_check_interval(), Duration::from_secs(1));

        let config = ServerConfig {
            default_duration_secs: i64::MAX,
            retention_hours: Some(i64::MAX),
            retention_check_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.guard_config().default_duration,
            chrono::Duration::seconds(DEFAULT_DURATION_SECS)
        );
        assert!(config.retention().is_none());
        assert_eq!(config.retention_check_interval(), Duration::from_secs(1));
    }
}
