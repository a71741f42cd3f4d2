//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::time::Duration;

/// Runtime settings for the Database controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Restrict the watch to one namespace (all namespaces when unset)
    pub namespace: Option<String>,
    /// Maximum concurrent reconciliations across distinct Databases
    pub concurrency: u16,
    /// Deadline for a single reconciliation
    pub reconcile_timeout: Duration,
    /// Delay before re-running a reconciliation that hit a write conflict
    pub requeue_interval: Duration,
    /// First delay after a failed reconciliation
    pub backoff_base: Duration,
    /// Upper bound for the failure delay
    pub backoff_max: Duration,
    /// Port for /metrics, /healthz and /readyz
    pub metrics_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            concurrency: 4,
            reconcile_timeout: Duration::from_secs(60),
            requeue_interval: Duration::from_secs(5),
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            metrics_port: 8081,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        let concurrency = parse_or(&lookup, "RECONCILE_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        let reconcile_timeout = seconds_or(&lookup, "RECONCILE_TIMEOUT_SECS", defaults.reconcile_timeout)?;
        let requeue_interval = seconds_or(&lookup, "REQUEUE_INTERVAL_SECS", defaults.requeue_interval)?;
        let backoff_base = seconds_or(&lookup, "BACKOFF_BASE_SECS", defaults.backoff_base)?;
        let backoff_max = seconds_or(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max)?;
        if backoff_max < backoff_base {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MAX_SECS ({}) must not be below BACKOFF_BASE_SECS ({})",
                backoff_max.as_secs(),
                backoff_base.as_secs()
            )));
        }
        let metrics_port = parse_or(&lookup, "METRICS_PORT", defaults.metrics_port)?;

        Ok(Self {
            namespace,
            concurrency,
            reconcile_timeout,
            requeue_interval,
            backoff_base,
            backoff_max,
            metrics_port,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ControllerError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{key} has invalid value {raw:?}"))
        }),
    }
}

fn seconds_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ControllerError> {
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}
