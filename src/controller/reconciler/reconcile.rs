//! # Reconcile
//!
//! Entry point invoked by the watch loop for every changed `Application`.

use crate::controller::error::{ErrorKind, ReconcilerError};
use crate::controller::reconciler::orchestrator::{PassReport, PassState};
use crate::controller::reconciler::types::Reconciler;
use crate::crd::Application;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Instrument};

pub async fn reconcile(
    app: Arc<Application>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = app.name_any();
    let namespace = app.namespace().unwrap_or_default();
    let span = tracing::info_span!(
        "reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        generation = app.metadata.generation.unwrap_or_default()
    );

    async move {
        if app.spec.suspend {
            info!("reconcile.suspended");
            return Ok(Action::await_change());
        }

        observability::metrics::increment_reconciliations();
        let start = Instant::now();

        let report = ctx.orchestrator.run(&app, ctx.shutdown.clone()).await;

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        info!(
            state = report.state.as_str(),
            steps_run = report.steps_run,
            "reconcile.pass.completed"
        );

        if matches!(
            report.state,
            PassState::Succeeded { .. } | PassState::Requeued(_)
        ) {
            ctx.reset_backoff(&format!("{namespace}/{name}"));
        }
        if let Some(reason) = requeue_reason(&report) {
            observability::metrics::increment_requeues(reason);
        }

        report.into_directive().into_action()
    }
    .instrument(span)
    .await
}

/// Metric label for passes that requeue without going through the error policy
fn requeue_reason(report: &PassReport) -> Option<&'static str> {
    match &report.state {
        PassState::Failed(error) => match error.kind() {
            ErrorKind::Conflict => Some("conflict"),
            ErrorKind::Cancelled => Some("cancelled"),
            _ => None,
        },
        PassState::Requeued(_) => Some("requested"),
        PassState::Succeeded { revisit: Some(_) } => Some("revisit"),
        PassState::Succeeded { revisit: None } | PassState::Pending | PassState::Running(_) => {
            None
        }
    }
}
