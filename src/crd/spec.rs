//! # Application Spec
//!
//! Main CRD specification types and default values.

use serde::{Deserialize, Serialize};

/// Application Custom Resource Definition
///
/// Describes a deployable workload and the routing that should expose it.
/// The platform identity of the application (region, app code, module,
/// environment, ...) travels in the resource annotations.
///
/// # Example
///
/// ```yaml
/// apiVersion: paas.platform.io/v1alpha1
/// kind: Application
/// metadata:
///   name: demo-web
///   namespace: demo-stag
///   annotations:
///     paas.platform.io/region: default
///     paas.platform.io/app-code: demo
///     paas.platform.io/app-name: Demo
///     paas.platform.io/module-name: web
///     paas.platform.io/environment: stag
/// spec:
///   image: registry.example.com/demo/web:1.4.2
///   replicas: 2
///   targetPort: 5000
///   domains:
///     - type: subdomain
///     - type: custom
///       domains:
///         - name: www
///           host: www.demo.io
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Application",
    group = "paas.platform.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ApplicationStatus",
    shortname = "app",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Description", "type":"string", "jsonPath":".status.description"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Container image of the workload
    pub image: String,
    /// Desired number of workload replicas
    /// Default: 1
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    /// Port the container listens on; the Service and every Ingress backend target it
    /// Default: 5000
    #[serde(default = "default_target_port")]
    pub target_port: i32,
    /// Routing rules, one entry per domain group
    #[serde(default)]
    pub domains: Vec<crate::crd::DomainGroupSpec>,
    /// Suspend reconciliation
    /// When true, the operator leaves the workload and its routing untouched
    /// Default: false
    #[serde(default = "default_false")]
    pub suspend: bool,
}

/// Default value for replicas
pub fn default_replicas() -> i32 {
    1
}

/// Default value for target port
pub fn default_target_port() -> i32 {
    5000
}

/// Default value for boolean false
pub fn default_false() -> bool {
    false
}
