//! # Domain Specification
//!
//! Declarative routing entries carried by `spec.domains`.

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Classification of a domain group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DomainSourceType {
    /// `{workload}.{baseDomain}`, derived from the application identity
    Subdomain,
    /// `{sharedHost}/{appCode}`, derived from the application identity
    Subpath,
    /// User-declared hosts
    Custom,
}

impl DomainSourceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainSourceType::Subdomain => "subdomain",
            DomainSourceType::Subpath => "subpath",
            DomainSourceType::Custom => "custom",
        }
    }
}

impl fmt::Display for DomainSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `spec.domains`
///
/// ```yaml
/// domains:
///   - type: subdomain
///   - type: subpath
///   - type: custom
///     domains:
///       - name: www
///         host: www.demo.io
///         pathPrefixes: ["/", "/api"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DomainGroupSpec {
    /// Platform subdomain; hosts are never user-supplied
    Subdomain,
    /// Shared platform host with an app-specific path prefix
    Subpath,
    /// User-declared domains
    Custom {
        #[serde(default)]
        domains: Vec<CustomDomainSpec>,
    },
}

impl DomainGroupSpec {
    #[must_use]
    pub fn source_type(&self) -> DomainSourceType {
        match self {
            DomainGroupSpec::Subdomain => DomainSourceType::Subdomain,
            DomainGroupSpec::Subpath => DomainSourceType::Subpath,
            DomainGroupSpec::Custom { .. } => DomainSourceType::Custom,
        }
    }
}

// Internally tagged enums derive a oneOf with `type` in every branch, which is
// not a structural schema. Publish one flat object instead.
impl JsonSchema for DomainGroupSpec {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("DomainGroupSpec")
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let domains = Vec::<CustomDomainSpec>::json_schema(generator);
        schemars::json_schema!({
            "type": "object",
            "description": "One routing group of the application",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["subdomain", "subpath", "custom"],
                    "description": "subdomain: platform subdomain. subpath: shared platform host with an app prefix. custom: the hosts listed in domains."
                },
                "domains": domains
            },
            "required": ["type"]
        })
    }
}

/// A user-declared domain
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomainSpec {
    /// Stable name; identifies the Ingress generated for this domain
    #[serde(default)]
    pub name: Option<String>,
    /// Host to route
    pub host: String,
    /// Path prefixes to route on the host
    /// Default: ["/"]
    #[serde(default)]
    pub path_prefixes: Vec<String>,
}
