//! # Domain Mapping
//!
//! Projects an application's `spec.domains` into normalized domain groups.
//!
//! The projection is a pure function of the identity, the spec entries and the
//! platform routing settings. Output order follows the spec entries, and within
//! a custom entry the declared domain order, so the same input always yields the
//! same list. Ingress names derived from the groups are compared by value
//! against the cluster, which makes this determinism load-bearing.

use crate::controller::app_info::ApplicationIdentity;
use crate::crd::{CustomDomainSpec, DomainGroupSpec, DomainSourceType};
use std::collections::BTreeSet;
use thiserror::Error;

/// Platform routing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSettings {
    /// Base domain for `subdomain` groups
    pub base_domain: String,
    /// Shared host for `subpath` groups
    pub subpath_host: String,
}

/// One routed host with its path prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Only set for `custom` groups, where it keys the generated Ingress
    pub name: Option<String>,
    pub host: String,
    pub path_prefixes: Vec<String>,
}

/// Domains derived from one spec entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainGroup {
    pub source_type: DomainSourceType,
    pub domains: Vec<Domain>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("custom domain '{host}' has no name; a stable name is required to identify its ingress")]
    MissingName { host: String },

    #[error("custom domain name '{name}' is not a valid DNS label")]
    InvalidName { name: String },

    #[error("custom domain name '{name}' is declared more than once")]
    DuplicateName { name: String },

    #[error("custom domain '{name}' has an empty host")]
    EmptyHost { name: String },

    #[error("path prefix '{prefix}' on host '{host}' must start with '/'")]
    InvalidPathPrefix { host: String, prefix: String },

    #[error("domain type '{source_type}' is declared more than once")]
    DuplicateGroup { source_type: DomainSourceType },
}

/// Build the ordered domain groups for an application
pub fn build(
    identity: &ApplicationIdentity,
    entries: &[DomainGroupSpec],
    settings: &DomainSettings,
) -> Result<Vec<DomainGroup>, DomainError> {
    let mut seen_types = BTreeSet::new();
    let mut seen_names = BTreeSet::new();
    let mut groups = Vec::with_capacity(entries.len());

    for entry in entries {
        let source_type = entry.source_type();
        // Multiple custom entries are fine; their names share one namespace below
        if source_type != DomainSourceType::Custom && !seen_types.insert(source_type.as_str()) {
            return Err(DomainError::DuplicateGroup { source_type });
        }

        let domains = match entry {
            DomainGroupSpec::Subdomain => vec![subdomain(identity, settings)],
            DomainGroupSpec::Subpath => vec![subpath(identity, settings)],
            DomainGroupSpec::Custom { domains } => domains
                .iter()
                .map(|spec| custom(spec, &mut seen_names))
                .collect::<Result<Vec<_>, _>>()?,
        };

        groups.push(DomainGroup {
            source_type,
            domains,
        });
    }

    Ok(groups)
}

fn subdomain(identity: &ApplicationIdentity, settings: &DomainSettings) -> Domain {
    let label = if identity.workload_name.is_empty() {
        &identity.app_code
    } else {
        &identity.workload_name
    };
    Domain {
        name: None,
        host: format!("{label}.{}", settings.base_domain),
        path_prefixes: vec!["/".to_string()],
    }
}

fn subpath(identity: &ApplicationIdentity, settings: &DomainSettings) -> Domain {
    Domain {
        name: None,
        host: settings.subpath_host.clone(),
        path_prefixes: vec![format!("/{}", identity.app_code)],
    }
}

fn custom(spec: &CustomDomainSpec, seen_names: &mut BTreeSet<String>) -> Result<Domain, DomainError> {
    let host = spec.host.trim().to_string();
    let name = spec
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| DomainError::MissingName { host: host.clone() })?
        .to_string();

    if !is_dns_label(&name) {
        return Err(DomainError::InvalidName { name });
    }
    if host.is_empty() {
        return Err(DomainError::EmptyHost { name });
    }
    if !seen_names.insert(name.clone()) {
        return Err(DomainError::DuplicateName { name });
    }

    let path_prefixes = if spec.path_prefixes.is_empty() {
        vec!["/".to_string()]
    } else {
        if let Some(prefix) = spec.path_prefixes.iter().find(|p| !p.starts_with('/')) {
            return Err(DomainError::InvalidPathPrefix {
                host,
                prefix: prefix.clone(),
            });
        }
        spec.path_prefixes.clone()
    };

    Ok(Domain {
        name: Some(name),
        host,
        path_prefixes,
    })
}

/// RFC 1123 label: lowercase alphanumerics and '-', at most 63 chars, alphanumeric at both ends
fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(workload_name: &str) -> ApplicationIdentity {
        ApplicationIdentity {
            region: "default".to_string(),
            app_code: "demo".to_string(),
            app_name: "Demo".to_string(),
            module_name: "web".to_string(),
            environment: "stag".to_string(),
            workload_name: workload_name.to_string(),
            tenant_id: String::new(),
        }
    }

    fn settings() -> DomainSettings {
        DomainSettings {
            base_domain: "example.com".to_string(),
            subpath_host: "apps.example.com".to_string(),
        }
    }

    fn custom_entry(domains: Vec<(Option<&str>, &str, Vec<&str>)>) -> DomainGroupSpec {
        DomainGroupSpec::Custom {
            domains: domains
                .into_iter()
                .map(|(name, host, prefixes)| CustomDomainSpec {
                    name: name.map(str::to_string),
                    host: host.to_string(),
                    path_prefixes: prefixes.into_iter().map(str::to_string).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_subdomain_uses_app_code_without_workload_name() {
        let groups = build(&identity(""), &[DomainGroupSpec::Subdomain], &settings()).unwrap();
        assert_eq!(
            groups,
            vec![DomainGroup {
                source_type: DomainSourceType::Subdomain,
                domains: vec![Domain {
                    name: None,
                    host: "demo.example.com".to_string(),
                    path_prefixes: vec!["/".to_string()],
                }],
            }]
        );
    }

    #[test]
    fn test_subdomain_prefers_workload_name() {
        let groups = build(
            &identity("workload-demo-stag"),
            &[DomainGroupSpec::Subdomain],
            &settings(),
        )
        .unwrap();
        assert_eq!(groups[0].domains[0].host, "workload-demo-stag.example.com");
    }

    #[test]
    fn test_subpath_uses_shared_host() {
        let groups = build(&identity(""), &[DomainGroupSpec::Subpath], &settings()).unwrap();
        assert_eq!(groups[0].source_type, DomainSourceType::Subpath);
        assert_eq!(groups[0].domains[0].host, "apps.example.com");
        assert_eq!(groups[0].domains[0].path_prefixes, vec!["/demo".to_string()]);
    }

    #[test]
    fn test_custom_defaults_path_prefix() {
        let entry = custom_entry(vec![
            (Some("www"), "www.demo.io", vec![]),
            (Some("api"), "api.demo.io", vec!["/v1", "/v2"]),
        ]);
        let groups = build(&identity(""), &[entry], &settings()).unwrap();

        let domains = &groups[0].domains;
        assert_eq!(domains[0].name.as_deref(), Some("www"));
        assert_eq!(domains[0].path_prefixes, vec!["/".to_string()]);
        assert_eq!(
            domains[1].path_prefixes,
            vec!["/v1".to_string(), "/v2".to_string()]
        );
    }

    #[test]
    fn test_custom_without_name_is_rejected() {
        let entry = custom_entry(vec![(None, "www.demo.io", vec![])]);
        let err = build(&identity(""), &[entry], &settings()).unwrap_err();
        assert_eq!(
            err,
            DomainError::MissingName {
                host: "www.demo.io".to_string()
            }
        );
    }

    #[test]
    fn test_custom_duplicate_names_across_entries_are_rejected() {
        let entries = vec![
            custom_entry(vec![(Some("www"), "www.demo.io", vec![])]),
            custom_entry(vec![(Some("www"), "www.demo.net", vec![])]),
        ];
        let err = build(&identity(""), &entries, &settings()).unwrap_err();
        assert_eq!(
            err,
            DomainError::DuplicateName {
                name: "www".to_string()
            }
        );
    }

    #[test]
    fn test_custom_invalid_name_and_prefix() {
        let entry = custom_entry(vec![(Some("WWW_1"), "www.demo.io", vec![])]);
        assert!(matches!(
            build(&identity(""), &[entry], &settings()),
            Err(DomainError::InvalidName { .. })
        ));

        let entry = custom_entry(vec![(Some("www"), "www.demo.io", vec!["api"])]);
        assert!(matches!(
            build(&identity(""), &[entry], &settings()),
            Err(DomainError::InvalidPathPrefix { .. })
        ));
    }

    #[test]
    fn test_duplicate_platform_group_is_rejected() {
        let entries = vec![DomainGroupSpec::Subdomain, DomainGroupSpec::Subdomain];
        assert_eq!(
            build(&identity(""), &entries, &settings()).unwrap_err(),
            DomainError::DuplicateGroup {
                source_type: DomainSourceType::Subdomain
            }
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let entries = vec![
            custom_entry(vec![
                (Some("b"), "b.demo.io", vec!["/x"]),
                (Some("a"), "a.demo.io", vec![]),
            ]),
            DomainGroupSpec::Subpath,
            DomainGroupSpec::Subdomain,
        ];
        let first = build(&identity("web"), &entries, &settings()).unwrap();
        let second = build(&identity("web"), &entries, &settings()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].domains[0].name.as_deref(), Some("b"));
        assert_eq!(first[1].source_type, DomainSourceType::Subpath);
    }

    #[test]
    fn test_empty_spec_yields_no_groups() {
        assert!(build(&identity(""), &[], &settings()).unwrap().is_empty());
    }
}
