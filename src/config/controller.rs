//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::controller::domain::DomainSettings;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
/// The value is built once at startup and handed to the reconciler behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Revisit period after a pass where every step completed (seconds)
    /// Drives drift detection for resources that are already converged
    pub default_revisit_secs: u64,
    /// Requeue interval for cancelled passes and unclassified errors (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Requeue interval for invalid metadata or domain specs (seconds)
    pub invalid_spec_requeue_secs: u64,
    /// Poll interval while a workload is rolling out (seconds)
    pub readiness_poll_secs: u64,
    /// Fibonacci backoff floor for transport failures (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for transport failures (seconds)
    pub backoff_max_secs: u64,
    /// Base domain for `subdomain` routing
    pub base_domain: String,
    /// Shared platform host for `subpath` routing
    pub subpath_host: String,
    /// Ingress class stamped on every generated Ingress (cluster default when unset)
    pub ingress_class_name: Option<String>,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Maximum concurrent reconciliations across distinct resources
    pub max_concurrent_reconciliations: u16,
    /// Namespace where the operator is deployed
    pub controller_namespace: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            default_revisit_secs: DEFAULT_REVISIT_SECS,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            invalid_spec_requeue_secs: DEFAULT_INVALID_SPEC_REQUEUE_SECS,
            readiness_poll_secs: DEFAULT_READINESS_POLL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            subpath_host: DEFAULT_SUBPATH_HOST.to_string(),
            ingress_class_name: None,
            metrics_port: DEFAULT_METRICS_PORT,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            controller_namespace: DEFAULT_CONTROLLER_NAMESPACE.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            default_revisit_secs: env_var_or_default("DEFAULT_REVISIT_SECS", DEFAULT_REVISIT_SECS),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            invalid_spec_requeue_secs: env_var_or_default(
                "INVALID_SPEC_REQUEUE_SECS",
                DEFAULT_INVALID_SPEC_REQUEUE_SECS,
            ),
            readiness_poll_secs: env_var_or_default(
                "READINESS_POLL_SECS",
                DEFAULT_READINESS_POLL_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            base_domain: env_var_or_default_str("BASE_DOMAIN", DEFAULT_BASE_DOMAIN),
            subpath_host: env_var_or_default_str("SUBPATH_HOST", DEFAULT_SUBPATH_HOST),
            ingress_class_name: std::env::var("INGRESS_CLASS_NAME")
                .ok()
                .filter(|v| !v.is_empty()),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            controller_namespace: env_var_or_default_str(
                "POD_NAMESPACE",
                DEFAULT_CONTROLLER_NAMESPACE,
            ),
        }
    }

    /// Get steady-state revisit duration
    pub fn default_revisit_duration(&self) -> Duration {
        Duration::from_secs(self.default_revisit_secs)
    }

    /// Get reconciliation error requeue duration
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    /// Get invalid spec requeue duration
    pub fn invalid_spec_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.invalid_spec_requeue_secs)
    }

    /// Get readiness poll duration
    pub fn readiness_poll_duration(&self) -> Duration {
        Duration::from_secs(self.readiness_poll_secs)
    }

    /// Routing settings consumed by the domain mapping builder
    pub fn domain_settings(&self) -> DomainSettings {
        DomainSettings {
            base_domain: self.base_domain.clone(),
            subpath_host: self.subpath_host.clone(),
        }
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
