//! # Orchestrator
//!
//! Runs the ordered steps of one reconcile pass.
//!
//! ```text
//! Pending -> Running(0) -> Running(1) -> ... -> Succeeded | Failed | Requeued
//! ```
//!
//! Step tokens are folded with [`ControlToken::then`]; the first token that
//! asks to abort ends the pass, and later steps never run. A pass that gets
//! through every step succeeds with the default revisit period so drift is
//! picked up in steady state.
//!
//! The pass races every step against the shutdown signal. A cancelled pass is
//! reported as a failure that reschedules with the error requeue period.

use crate::controller::error::{ErrorKind, ReconcilerError};
use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::token::{ControlToken, SchedulingDirective, TokenOutcome};
use crate::crd::Application;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Where a pass is, or how it ended
#[derive(Debug)]
pub enum PassState {
    Pending,
    /// Executing the step at this index
    Running(usize),
    /// All steps ran, or a step finished the pass early (`revisit: None`)
    Succeeded { revisit: Option<Duration> },
    Failed(ReconcilerError),
    Requeued(Duration),
}

impl PassState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PassState::Pending => "pending",
            PassState::Running(_) => "running",
            PassState::Succeeded { .. } => "succeeded",
            PassState::Failed(_) => "failed",
            PassState::Requeued(_) => "requeued",
        }
    }
}

/// Result of one pass
#[derive(Debug)]
pub struct PassReport {
    pub state: PassState,
    /// Number of steps that were invoked
    pub steps_run: usize,
    cancellation_requeue: Duration,
}

impl PassReport {
    /// Scheduling directive for the work queue
    ///
    /// A conflict retries the whole pass immediately; a cancelled pass comes
    /// back after the error requeue period.
    pub fn into_directive(self) -> SchedulingDirective {
        match self.state {
            PassState::Failed(error) => match error.kind() {
                ErrorKind::Conflict => SchedulingDirective::RetryNow,
                ErrorKind::Cancelled => SchedulingDirective::RetryAfter(self.cancellation_requeue),
                _ => SchedulingDirective::PropagateError(error),
            },
            PassState::Succeeded { revisit: None } => SchedulingDirective::Stop,
            PassState::Succeeded {
                revisit: Some(after),
            }
            | PassState::Requeued(after) => SchedulingDirective::RetryAfter(after),
            // Not terminal; nothing was decided, so run the pass again
            PassState::Pending | PassState::Running(_) => SchedulingDirective::RetryNow,
        }
    }
}

pub struct Orchestrator {
    steps: Vec<Box<dyn ReconcilerStep>>,
    default_revisit: Duration,
    cancellation_requeue: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("steps", &self.step_names())
            .field("default_revisit", &self.default_revisit)
            .field("cancellation_requeue", &self.cancellation_requeue)
            .finish()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(default_revisit: Duration, cancellation_requeue: Duration) -> Self {
        Self {
            steps: Vec::new(),
            default_revisit,
            cancellation_requeue,
        }
    }

    /// Append a step; steps run in the order they are added
    #[must_use]
    pub fn with_step(mut self, step: impl ReconcilerStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run one pass over `app`
    ///
    /// `cancel` flips to `true` on shutdown. A dropped sender is never treated
    /// as cancellation.
    pub async fn run(&self, app: &Application, mut cancel: watch::Receiver<bool>) -> PassReport {
        let mut pass = PassContext::default();
        let mut token = ControlToken::proceed();
        let mut state = PassState::Pending;

        for (index, step) in self.steps.iter().enumerate() {
            state = PassState::Running(index);

            let step_token = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => {
                    warn!(step = step.name(), "reconcile.pass.cancelled");
                    ControlToken::proceed().with_failure(ReconcilerError::Cancelled)
                }
                step_token = step.reconcile(app, &mut pass) => step_token,
            };

            debug!(
                step = step.name(),
                abort = step_token.should_abort(),
                "reconcile.step.completed"
            );

            token = token.then(step_token);
            if token.should_abort() {
                break;
            }
        }

        let steps_run = match state {
            PassState::Running(index) => index + 1,
            _ => 0,
        };

        let state = match token.into_outcome() {
            TokenOutcome::Failed(error) => PassState::Failed(error),
            TokenOutcome::Finished => PassState::Succeeded { revisit: None },
            TokenOutcome::Requeue(after) => PassState::Requeued(after),
            TokenOutcome::Continue => PassState::Succeeded {
                revisit: Some(self.default_revisit),
            },
        };

        PassReport {
            state,
            steps_run,
            cancellation_requeue: self.cancellation_requeue,
        }
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let sender_dropped = cancel.wait_for(|cancelled| *cancelled).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
}
