//! # Control Token
//!
//! Outcome of a single reconciler step.
//!
//! A token is a value: every combinator consumes it and returns a new one, so a
//! step can never observe or alias another step's intermediate outcome. The
//! orchestrator composes step outcomes with [`ControlToken::then`], which is
//! left-biased: the first non-continue outcome wins.
//!
//! Signal priority when more than one is set is `failure > finished > requeue`.

use crate::controller::error::{ErrorKind, ReconcilerError};
use kube_runtime::controller::Action;
use std::time::Duration;

/// Outcome of one reconciler step
///
/// The all-zero token (`ControlToken::proceed()`) means "continue with the next step".
#[derive(Debug, Default)]
#[must_use]
pub struct ControlToken {
    failure: Option<ReconcilerError>,
    requeue_after: Duration,
    finished: bool,
}

/// The signal a token carries, resolved by priority
#[derive(Debug)]
pub enum TokenOutcome {
    Continue,
    Failed(ReconcilerError),
    Finished,
    Requeue(Duration),
}

impl ControlToken {
    /// The "continue normally" token
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Record a failure; it dominates every other signal from here on
    pub fn with_failure(mut self, error: impl Into<ReconcilerError>) -> Self {
        if self.failure.is_none() {
            self.failure = Some(error.into());
        }
        self
    }

    /// Ask for the resource to be revisited after `after`
    ///
    /// Ignored once a failure is recorded. When asked more than once the
    /// shortest non-zero duration is kept.
    pub fn requeue_after(mut self, after: Duration) -> Self {
        if self.failure.is_some() || after.is_zero() {
            return self;
        }
        self.requeue_after = if self.requeue_after.is_zero() {
            after
        } else {
            self.requeue_after.min(after)
        };
        self
    }

    /// Mark the resource as fully reconciled for this pass
    pub fn finish(mut self) -> Self {
        self.finished = true;
        self
    }

    /// Whether the pass must stop after this step
    #[must_use]
    pub fn should_abort(&self) -> bool {
        self.failure.is_some() || self.finished || !self.requeue_after.is_zero()
    }

    #[must_use]
    pub fn is_continue(&self) -> bool {
        !self.should_abort()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ReconcilerError> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(ReconcilerError::kind)
    }

    #[must_use]
    pub fn requeue_duration(&self) -> Duration {
        self.requeue_after
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Left-biased composition: keep `self` unless it is the continue token
    pub fn then(self, next: ControlToken) -> ControlToken {
        if self.is_continue() {
            next
        } else {
            self
        }
    }

    /// Resolve the token to a single signal (`failure > finished > requeue`)
    pub fn into_outcome(self) -> TokenOutcome {
        if let Some(error) = self.failure {
            TokenOutcome::Failed(error)
        } else if self.finished {
            TokenOutcome::Finished
        } else if !self.requeue_after.is_zero() {
            TokenOutcome::Requeue(self.requeue_after)
        } else {
            TokenOutcome::Continue
        }
    }
}

/// Instruction handed back to the work queue
#[derive(Debug)]
pub enum SchedulingDirective {
    /// Run a fresh pass right away
    RetryNow,
    /// Run a fresh pass after the duration
    RetryAfter(Duration),
    /// Wait for the next external change
    Stop,
    /// Hand the error to the error policy, which picks the backoff
    PropagateError(ReconcilerError),
}

impl SchedulingDirective {
    /// Short label used for logging and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingDirective::RetryNow => "retry-now",
            SchedulingDirective::RetryAfter(_) => "retry-after",
            SchedulingDirective::Stop => "stop",
            SchedulingDirective::PropagateError(_) => "propagate-error",
        }
    }

    /// Convert to the kube-runtime action
    pub fn into_action(self) -> Result<Action, ReconcilerError> {
        match self {
            SchedulingDirective::RetryNow => Ok(Action::requeue(Duration::ZERO)),
            SchedulingDirective::RetryAfter(after) => Ok(Action::requeue(after)),
            SchedulingDirective::Stop => Ok(Action::await_change()),
            SchedulingDirective::PropagateError(error) => Err(error),
        }
    }
}
