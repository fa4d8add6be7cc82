//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Interval values are defaults; `ControllerConfig::from_env` lets each of them
//! be overridden through the deployment environment.

/// API group of the `Application` custom resource
pub const API_GROUP: &str = "paas.platform.io";

/// Field manager / controller name reported to the API server
pub const FIELD_MANAGER: &str = "app-operator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Steady-state revisit period after a fully successful pass (seconds)
pub const DEFAULT_REVISIT_SECS: u64 = 300;

/// Requeue interval after a pass was cancelled or failed without a classification (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Bounded retry for resources whose metadata or domain spec is invalid (seconds)
/// Retrying sooner would fail identically until the resource is fixed
pub const DEFAULT_INVALID_SPEC_REQUEUE_SECS: u64 = 300;

/// How often to re-check a workload that is still rolling out (seconds)
pub const DEFAULT_READINESS_POLL_SECS: u64 = 10;

/// Fibonacci backoff floor for transport failures (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 60;

/// Fibonacci backoff ceiling for transport failures (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Base domain used for `subdomain` routing
pub const DEFAULT_BASE_DOMAIN: &str = "example.com";

/// Shared platform host used for `subpath` routing
pub const DEFAULT_SUBPATH_HOST: &str = "apps.example.com";

/// Default namespace of the operator itself
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "paas-system";

/// Default bound on parallel reconciliations across distinct resources
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

// Well-known annotation keys read by the identity extractor

pub const ANNOTATION_REGION: &str = "paas.platform.io/region";
pub const ANNOTATION_APP_CODE: &str = "paas.platform.io/app-code";
pub const ANNOTATION_APP_NAME: &str = "paas.platform.io/app-name";
pub const ANNOTATION_MODULE_NAME: &str = "paas.platform.io/module-name";
pub const ANNOTATION_ENVIRONMENT: &str = "paas.platform.io/environment";
pub const ANNOTATION_WORKLOAD_NAME: &str = "paas.platform.io/workload-name";
pub const ANNOTATION_TENANT_ID: &str = "paas.platform.io/tenant-id";

/// Hash of the desired object, compared before every update
pub const ANNOTATION_SPEC_HASH: &str = "paas.platform.io/spec-hash";

// Labels stamped on every child object

pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_APP_CODE: &str = "paas.platform.io/app-code";
pub const LABEL_MODULE_NAME: &str = "paas.platform.io/module-name";
pub const LABEL_ENVIRONMENT: &str = "paas.platform.io/environment";
pub const LABEL_WORKLOAD: &str = "paas.platform.io/workload";
pub const LABEL_DOMAIN_SOURCE: &str = "paas.platform.io/domain-source";
