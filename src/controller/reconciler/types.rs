//! # Types
//!
//! Reconciler context shared by every pass.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::orchestrator::Orchestrator;
use crate::controller::reconciler::steps::{
    DeletionStep, DomainsStep, IdentityStep, ReadinessStep, StatusStep, StatusWriter,
    WorkloadStep,
};
use crate::controller::upsert::{KubeObjectApi, ObjectApi, PruneApi};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Cluster API capabilities the steps write through
#[derive(Clone)]
pub struct ClusterApis {
    pub deployments: Arc<dyn ObjectApi<Deployment>>,
    pub services: Arc<dyn ObjectApi<Service>>,
    pub ingresses: Arc<dyn ObjectApi<Ingress>>,
    pub ingress_pruner: Arc<dyn PruneApi<Ingress>>,
    pub status: Arc<dyn StatusWriter>,
}

impl std::fmt::Debug for ClusterApis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterApis").finish_non_exhaustive()
    }
}

impl ClusterApis {
    /// Every capability backed by the same API server client
    pub fn from_client(client: Client) -> Self {
        let api = Arc::new(KubeObjectApi::new(client));
        Self {
            deployments: Arc::clone(&api) as Arc<dyn ObjectApi<Deployment>>,
            services: Arc::clone(&api) as Arc<dyn ObjectApi<Service>>,
            ingresses: Arc::clone(&api) as Arc<dyn ObjectApi<Ingress>>,
            ingress_pruner: Arc::clone(&api) as Arc<dyn PruneApi<Ingress>>,
            status: api,
        }
    }
}

/// The operator's step sequence
///
/// Order matters: identity must resolve before anything that names child
/// objects, and status is reported only after the rollout is ready.
pub fn build_orchestrator(apis: ClusterApis, config: &ControllerConfig) -> Orchestrator {
    Orchestrator::new(
        config.default_revisit_duration(),
        config.reconciliation_error_requeue_duration(),
    )
    .with_step(DeletionStep)
    .with_step(IdentityStep)
    .with_step(WorkloadStep::new(Arc::clone(&apis.deployments), apis.services))
    .with_step(DomainsStep::new(
        apis.ingresses,
        apis.ingress_pruner,
        config.domain_settings(),
        config.ingress_class_name.clone(),
    ))
    .with_step(ReadinessStep::new(
        apis.deployments,
        Arc::clone(&apis.status),
        config.readiness_poll_duration(),
    ))
    .with_step(StatusStep::new(apis.status))
}

pub struct Reconciler {
    pub orchestrator: Orchestrator,
    pub config: Arc<ControllerConfig>,
    // Backoff state per resource (identified by namespace/name), driven by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    // Flips to true on shutdown; in-flight passes abort
    pub shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("orchestrator", &self.orchestrator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Client,
        config: Arc<ControllerConfig>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let orchestrator = build_orchestrator(ClusterApis::from_client(client), &config);
        Self::with_orchestrator(orchestrator, config, shutdown)
    }

    pub fn with_orchestrator(
        orchestrator: Orchestrator,
        config: Arc<ControllerConfig>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            orchestrator,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
        }
    }

    /// Forget accumulated errors for a resource after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }

    /// Next Fibonacci backoff for a resource, and how many errors it has seen
    pub fn next_backoff(&self, resource_key: &str) -> Option<(u64, u32)> {
        let mut states = self.backoff_states.lock().ok()?;
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        Some((state.backoff.next_backoff_seconds(), state.error_count))
    }
}
