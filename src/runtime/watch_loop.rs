//! # Watch Loop
//!
//! Watches `Application` resources, and the Deployments, Services and Ingresses
//! they own, and runs a reconcile pass whenever any of them changes.
//!
//! Shutdown on SIGTERM/SIGINT:
//! 1. `/readyz` starts returning 503
//! 2. the shutdown channel flips, so in-flight passes abort with `Cancelled`
//! 3. kube-runtime stops scheduling new passes and the loop exits
//!
//! Both the reconcile passes and the controller are driven from the same
//! signal task, so the controller never stops ahead of the shutdown channel.

use crate::constants::{FIELD_MANAGER, LABEL_MANAGED_BY};
use crate::controller::reconciler::reconcile;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::initialization::InitializationResult;
use crate::server::ServerState;
use futures::channel::oneshot;
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

const WATCH_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Run the controller watch loop until a shutdown signal arrives
///
/// The watch is restarted if its stream ends for any reason other than shutdown.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        reconciler,
        server_state,
        config,
        shutdown,
        server_handle,
    } = init;

    let mut shutdown_rx = shutdown.subscribe();
    let stop = spawn_shutdown_task(shutdown_signal(), shutdown, Arc::clone(&server_state));

    // Only children this operator stamped are worth a pass
    let owned = watcher::Config::default().labels(&format!("{LABEL_MANAGED_BY}={FIELD_MANAGER}"));

    loop {
        if *shutdown_rx.borrow_and_update() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop",
            concurrency = config.max_concurrent_reconciliations
        );

        let controller = Controller::new(
            Api::<crate::crd::Application>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(Api::<Deployment>::all(client.clone()), owned.clone())
        .owns(Api::<Service>::all(client.clone()), owned.clone())
        .owns(Api::<Ingress>::all(client.clone()), owned.clone())
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
        .graceful_shutdown_on(stop.clone());

        server_state.is_ready.store(true, Ordering::Relaxed);
        info!("Starting controller watch loop...");

        controller
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .for_each(|result| {
                match result {
                    Ok((obj, action)) => {
                        debug!(
                            resource.name = obj.name.as_str(),
                            resource.namespace = obj.namespace.as_deref().unwrap_or_default(),
                            action = ?action,
                            "watch.event.reconciled"
                        );
                    }
                    Err(controller::Error::ReconcilerFailed(e, obj)) => {
                        // Already logged and requeued by the error policy
                        debug!(
                            resource.name = obj.name.as_str(),
                            error = %e,
                            "watch.event.reconciliation_failed"
                        );
                    }
                    Err(controller::Error::ObjectNotFound(obj)) => {
                        debug!(resource.name = obj.name.as_str(), "watch.event.object_gone");
                    }
                    Err(e) => {
                        warn!(error = %e, "watch.stream.error");
                    }
                }
                futures::future::ready(())
            })
            .instrument(watch_span)
            .await;

        if *shutdown_rx.borrow_and_update() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        server_state.is_ready.store(false, Ordering::Relaxed);
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            WATCH_RESTART_DELAY.as_secs()
        );
        tokio::select! {
            () = tokio::time::sleep(WATCH_RESTART_DELAY) => {}
            () = stop.clone() => {}
        }
    }

    server_handle.abort();
    info!("Controller stopped gracefully");
    Ok(())
}

/// Wait for `signal`, then mark the server not ready and flip `shutdown`
///
/// The returned future resolves only after the shutdown channel has flipped,
/// and is cloned into every controller the loop starts. It also resolves if
/// the task goes away without a signal.
fn spawn_shutdown_task(
    signal: impl Future<Output = ()> + Send + 'static,
    shutdown: watch::Sender<bool>,
    server_state: Arc<ServerState>,
) -> impl Future<Output = ()> + Clone + Send + Sync + 'static {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        signal.await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");

        server_state.is_ready.store(false, Ordering::Relaxed);
        if shutdown.send(true).is_err() {
            debug!("No reconcile passes listening for shutdown");
        }
        let _ = stop_tx.send(());
        info!("Marked server as not ready, cancelling in-flight reconciliations...");
    });
    stop_rx.map(|_| ()).shared()
}

/// Resolves on SIGTERM (Kubernetes) or SIGINT (manual interruption)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, listening for SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
