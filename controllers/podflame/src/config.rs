//! Operator configuration.
//!
//! Read once at start-up from environment variables.

use crate::error::ControllerError;
use std::env;
use std::time::Duration;

/// Namespace profiler pods are created in when `OPERATOR_NAMESPACE` is unset
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "profile-pod-operator";

/// Agent image used when `AGENT_IMAGE` is unset
pub const DEFAULT_AGENT_IMAGE: &str = "pp:v1";

/// Harvest ceiling used when `LOG_LIMIT_BYTES` is unset (1 MiB)
pub const DEFAULT_LOG_LIMIT_BYTES: usize = 1024 * 1024;

const DEFAULT_ERROR_REQUEUE_SECONDS: u64 = 10;
const DEFAULT_CONCURRENCY: u16 = 4;

/// Runtime configuration of the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace profiler pods are created in
    pub operator_namespace: String,
    /// Image of the profiling agent
    pub agent_image: String,
    /// Only watch PodFlames in this namespace (`None` = all namespaces)
    pub watch_namespace: Option<String>,
    /// Upper bound on harvested profiler output, in bytes
    pub log_limit_bytes: usize,
    /// Delay before a failed pass is re-run
    pub error_requeue: Duration,
    /// Maximum number of passes running in parallel
    pub concurrency: u16,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            agent_image: DEFAULT_AGENT_IMAGE.to_string(),
            watch_namespace: None,
            log_limit_bytes: DEFAULT_LOG_LIMIT_BYTES,
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECONDS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl OperatorConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_limit_bytes = match get("LOG_LIMIT_BYTES") {
            Some(v) => parse_number::<usize>("LOG_LIMIT_BYTES", &v)?,
            None => defaults.log_limit_bytes,
        };
        if log_limit_bytes == 0 {
            return Err(ControllerError::InvalidConfig(
                "LOG_LIMIT_BYTES must be greater than zero".to_string(),
            ));
        }

        let error_requeue = match get("ERROR_REQUEUE_SECONDS") {
            Some(v) => Duration::from_secs(parse_number::<u64>("ERROR_REQUEUE_SECONDS", &v)?),
            None => defaults.error_requeue,
        };

        let concurrency = match get("RECONCILE_CONCURRENCY") {
            Some(v) => parse_number::<u16>("RECONCILE_CONCURRENCY", &v)?,
            None => defaults.concurrency,
        };

        Ok(Self {
            operator_namespace: get("OPERATOR_NAMESPACE").unwrap_or(defaults.operator_namespace),
            agent_image: get("AGENT_IMAGE").unwrap_or(defaults.agent_image),
            watch_namespace: get("WATCH_NAMESPACE"),
            log_limit_bytes,
            error_requeue,
            concurrency,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ControllerError> {
    value.trim().parse::<T>().map_err(|_| {
        ControllerError::InvalidConfig(format!("{} must be a non-negative integer, got {:?}", key, value))
    })
}
