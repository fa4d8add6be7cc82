//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client and reconciler context.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::crd::Application;
use crate::observability;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// Reconciler context shared by every pass
    pub reconciler: Arc<Reconciler>,
    /// Readiness flag served on `/readyz`
    pub server_state: Arc<ServerState>,
    pub config: Arc<ControllerConfig>,
    /// Sending `true` cancels in-flight passes
    pub shutdown: watch::Sender<bool>,
    pub server_handle: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - CRD queryability check
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before the Kubernetes client opens any TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        // Another component installed a provider first; it is used as-is
        eprintln!("rustls crypto provider already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app_operator=info".into()),
        )
        .init();

    info!("Starting Application operator");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let config = Arc::new(ControllerConfig::from_env());
    info!(
        metrics_port = config.metrics_port,
        max_concurrent_reconciliations = config.max_concurrent_reconciliations,
        default_revisit_secs = config.default_revisit_duration().as_secs(),
        base_domain = config.base_domain.as_str(),
        controller_namespace = config.controller_namespace.as_str(),
        "config.loaded"
    );

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    check_crd_queryable(&Api::<Application>::all(client.clone())).await;

    let (shutdown, shutdown_rx) = watch::channel(false);
    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        Arc::clone(&config),
        shutdown_rx,
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        config,
        shutdown,
        server_handle,
    })
}

/// Log whether the `Application` CRD is served
///
/// A missing CRD is not fatal: the watch loop retries until it is installed.
async fn check_crd_queryable(apps: &Api<Application>) {
    let startup_span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.crd_check",
        resource.kind = "Application"
    );

    async {
        match apps.list(&ListParams::default().limit(1)).await {
            Ok(list) => {
                info!(
                    sample = list.items.len(),
                    "CRD is queryable, watch will pick up existing Application resources"
                );
            }
            Err(e) => {
                error!("CRD is not queryable; {:?}. Is the CRD installed?", e);
                error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
                warn!(error = %e, "CRD queryability check failed");
            }
        }
    }
    .instrument(startup_span)
    .await;
}
