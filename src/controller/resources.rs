//! # Desired Objects
//!
//! Builders for the child objects of an `Application`: one Deployment and one
//! Service named after the workload, and one Ingress per routed domain.
//!
//! Every builder is a pure function of the resource, its identity and the
//! domain groups, and stamps a spec hash on its output so the merge policy can
//! skip unchanged writes. Ingress names are derived from the domain source type
//! (and the declared name for custom domains), which keeps them stable across
//! passes.

use crate::constants::{
    FIELD_MANAGER, LABEL_APP_CODE, LABEL_DOMAIN_SOURCE, LABEL_ENVIRONMENT, LABEL_MANAGED_BY,
    LABEL_MODULE_NAME, LABEL_WORKLOAD,
};
use crate::controller::app_info::ApplicationIdentity;
use crate::controller::domain::{Domain, DomainGroup};
use crate::controller::upsert::{stamp_spec_hash, SpecHashMerge};
use crate::crd::{Application, DomainSourceType};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Merge policy for Deployments: replicas, pod labels and the workload container
pub const DEPLOYMENT_MERGE: SpecHashMerge<Deployment> = SpecHashMerge::new(merge_deployment);

/// Merge policy for Services: selector and ports; allocated cluster IPs are kept
pub const SERVICE_MERGE: SpecHashMerge<Service> = SpecHashMerge::new(merge_service);

/// Merge policy for Ingresses: routing rules, and the class when one is configured
pub const INGRESS_MERGE: SpecHashMerge<Ingress> = SpecHashMerge::new(merge_ingress);

fn merge_deployment(current: &mut Deployment, desired: &Deployment) {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return;
    };
    let Some(spec) = current.spec.as_mut() else {
        current.spec = Some(desired_spec.clone());
        return;
    };

    spec.replicas = desired_spec.replicas;

    if let Some(labels) = desired_spec
        .template
        .metadata
        .as_ref()
        .and_then(|meta| meta.labels.as_ref())
    {
        spec.template
            .metadata
            .get_or_insert_with(ObjectMeta::default)
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels.clone());
    }

    let Some(desired_pod) = desired_spec.template.spec.as_ref() else {
        return;
    };
    let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
    for wanted in &desired_pod.containers {
        match pod.containers.iter_mut().find(|c| c.name == wanted.name) {
            Some(container) => {
                container.image.clone_from(&wanted.image);
                container.ports.clone_from(&wanted.ports);
            }
            None => pod.containers.push(wanted.clone()),
        }
    }
}

fn merge_service(current: &mut Service, desired: &Service) {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return;
    };
    let spec = current.spec.get_or_insert_with(ServiceSpec::default);
    spec.selector.clone_from(&desired_spec.selector);
    spec.ports.clone_from(&desired_spec.ports);
}

fn merge_ingress(current: &mut Ingress, desired: &Ingress) {
    let Some(desired_spec) = desired.spec.as_ref() else {
        return;
    };
    let spec = current.spec.get_or_insert_with(IngressSpec::default);
    spec.rules.clone_from(&desired_spec.rules);
    // An unset class leaves whatever the cluster default admission assigned
    if desired_spec.ingress_class_name.is_some() {
        spec.ingress_class_name.clone_from(&desired_spec.ingress_class_name);
    }
}

/// Labels shared by every child object
#[must_use]
pub fn common_labels(identity: &ApplicationIdentity) -> BTreeMap<String, String> {
    [
        (LABEL_MANAGED_BY, FIELD_MANAGER),
        (LABEL_APP_CODE, identity.app_code.as_str()),
        (LABEL_MODULE_NAME, identity.module_name.as_str()),
        (LABEL_ENVIRONMENT, identity.environment.as_str()),
        (LABEL_WORKLOAD, identity.workload_name.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Labels selecting the children this operator manages for one workload
#[must_use]
pub fn managed_selector(identity: &ApplicationIdentity) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_MANAGED_BY.to_string(), FIELD_MANAGER.to_string()),
        (LABEL_WORKLOAD.to_string(), identity.workload_name.clone()),
    ])
}

fn selector_labels(identity: &ApplicationIdentity) -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_WORKLOAD.to_string(), identity.workload_name.clone())])
}

fn child_metadata(
    app: &Application,
    name: String,
    labels: BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: app.namespace(),
        labels: Some(labels),
        owner_references: app.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..ObjectMeta::default()
    }
}

pub fn deployment(app: &Application, identity: &ApplicationIdentity) -> Deployment {
    let labels = common_labels(identity);
    let mut deployment = Deployment {
        metadata: child_metadata(app, identity.workload_name.clone(), labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: Some(app.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(identity)),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: identity.module_name.clone(),
                        image: Some(app.spec.image.clone()),
                        ports: Some(vec![ContainerPort {
                            container_port: app.spec.target_port,
                            name: Some("http".to_string()),
                            protocol: Some("TCP".to_string()),
                            ..ContainerPort::default()
                        }]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    };
    stamp_spec_hash(&mut deployment);
    deployment
}

pub fn service(app: &Application, identity: &ApplicationIdentity) -> Service {
    let mut service = Service {
        metadata: child_metadata(app, identity.workload_name.clone(), common_labels(identity)),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(identity)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: app.spec.target_port,
                target_port: Some(IntOrString::Int(app.spec.target_port)),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    };
    stamp_spec_hash(&mut service);
    service
}

/// Ingress name for one domain
///
/// `subdomain` and `subpath` groups hold exactly one domain each, so the
/// source type alone identifies them.
#[must_use]
pub fn ingress_name(workload_name: &str, source_type: DomainSourceType, domain: &Domain) -> String {
    match (source_type, domain.name.as_deref()) {
        (DomainSourceType::Custom, Some(name)) => format!("{workload_name}-custom-{name}"),
        (source_type, _) => format!("{workload_name}-{source_type}"),
    }
}

/// One Ingress per domain, in domain group order
pub fn ingresses(
    app: &Application,
    identity: &ApplicationIdentity,
    groups: &[DomainGroup],
    ingress_class_name: Option<&str>,
) -> Vec<Ingress> {
    groups
        .iter()
        .flat_map(|group| {
            group.domains.iter().map(move |domain| {
                ingress(app, identity, group.source_type, domain, ingress_class_name)
            })
        })
        .collect()
}

fn ingress(
    app: &Application,
    identity: &ApplicationIdentity,
    source_type: DomainSourceType,
    domain: &Domain,
    ingress_class_name: Option<&str>,
) -> Ingress {
    let mut labels = common_labels(identity);
    labels.insert(LABEL_DOMAIN_SOURCE.to_string(), source_type.to_string());

    let paths = domain
        .path_prefixes
        .iter()
        .map(|prefix| HTTPIngressPath {
            path: Some(prefix.clone()),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: identity.workload_name.clone(),
                    port: Some(ServiceBackendPort {
                        number: Some(app.spec.target_port),
                        ..ServiceBackendPort::default()
                    }),
                }),
                ..IngressBackend::default()
            },
        })
        .collect();

    let mut ingress = Ingress {
        metadata: child_metadata(
            app,
            ingress_name(&identity.workload_name, source_type, domain),
            labels,
        ),
        spec: Some(IngressSpec {
            ingress_class_name: ingress_class_name.map(str::to_string),
            rules: Some(vec![IngressRule {
                host: Some(domain.host.clone()),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    };
    stamp_spec_hash(&mut ingress);
    ingress
}

/// Routed addresses (`host` + path prefix), in domain group order
#[must_use]
pub fn addresses(groups: &[DomainGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| &group.domains)
        .flat_map(|domain| {
            domain
                .path_prefixes
                .iter()
                .map(move |prefix| format!("{}{prefix}", domain.host))
        })
        .collect()
}

/// Whether `object` is owned by `app`
#[must_use]
pub fn is_owned_by<K: Resource>(object: &K, app: &Application) -> bool {
    let Some(uid) = app.meta().uid.as_deref() else {
        return false;
    };
    object
        .meta()
        .owner_references
        .iter()
        .flatten()
        .any(|owner| owner.uid == uid)
}
