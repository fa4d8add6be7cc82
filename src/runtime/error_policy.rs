//! # Error Policy
//!
//! Requeue decisions for passes that ended with an error.
//!
//! | Error kind              | Requeue                                      |
//! |-------------------------|----------------------------------------------|
//! | `Parse`, `Validation`   | invalid-spec period; retrying sooner fails identically |
//! | `Conflict`              | immediately, as a fresh pass                 |
//! | `Cancelled`             | error requeue period                         |
//! | everything else         | per-resource Fibonacci backoff               |
//!
//! Backoff state lives in the reconciler context, keyed by `namespace/name`,
//! and is reset by the next successful pass.

use crate::controller::error::ErrorKind;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::Application;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// kube-runtime `error_policy` callback
pub fn handle_reconciliation_error(
    obj: Arc<Application>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error.kind = error.kind().as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("reconciliation.failed");
    observability::metrics::increment_reconciliation_errors(error.kind().as_str());

    let (delay, reason) = requeue_delay(error, &format!("{namespace}/{name}"), &ctx);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        delay_secs = delay.as_secs(),
        next_trigger = next_trigger_time.to_rfc3339().as_str(),
        trigger_source = reason,
        "reconciliation.requeued"
    );

    observability::metrics::increment_requeues(reason);
    Action::requeue(delay)
}

/// Delay before the next pass, and the metric label for the decision
pub fn requeue_delay(
    error: &ReconcilerError,
    resource_key: &str,
    ctx: &Reconciler,
) -> (Duration, &'static str) {
    match error.kind() {
        ErrorKind::Parse | ErrorKind::Validation => (
            ctx.config.invalid_spec_requeue_duration(),
            "invalid-spec",
        ),
        ErrorKind::Conflict => (Duration::ZERO, "conflict"),
        ErrorKind::Cancelled => (
            ctx.config.reconciliation_error_requeue_duration(),
            "cancelled",
        ),
        ErrorKind::NotFound | ErrorKind::Transport | ErrorKind::Internal => {
            match ctx.next_backoff(resource_key) {
                Some((seconds, error_count)) => {
                    info!(error_count, "reconciliation.backoff");
                    (Duration::from_secs(seconds), "error-backoff")
                }
                None => {
                    warn!("Failed to lock backoff states, using default error requeue");
                    (
                        ctx.config.reconciliation_error_requeue_duration(),
                        "error-backoff",
                    )
                }
            }
        }
    }
}
