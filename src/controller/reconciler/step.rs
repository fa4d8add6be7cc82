//! # Reconciler Step
//!
//! One unit of reconciliation logic. Steps run in a fixed order and share what
//! they resolve through a per-pass [`PassContext`]; they never see each other's
//! tokens.

use crate::controller::app_info::ApplicationIdentity;
use crate::controller::error::ReconcilerError;
use crate::controller::token::ControlToken;
use crate::crd::Application;
use async_trait::async_trait;

#[async_trait]
pub trait ReconcilerStep: Send + Sync {
    /// Stable name, used in logs
    fn name(&self) -> &'static str;

    /// Inspect current state, converge what this step owns, and report the outcome
    ///
    /// Errors are never swallowed: they are returned as a failure token.
    async fn reconcile(&self, app: &Application, pass: &mut PassContext) -> ControlToken;
}

/// State resolved by earlier steps of the same pass
///
/// Built fresh for every pass and dropped at its end.
#[derive(Debug, Default)]
pub struct PassContext {
    pub identity: Option<ApplicationIdentity>,
    pub addresses: Vec<String>,
}

impl PassContext {
    /// The identity resolved earlier in the pass
    pub fn identity(&self, step: &'static str) -> Result<&ApplicationIdentity, ReconcilerError> {
        self.identity
            .as_ref()
            .ok_or(ReconcilerError::MissingPrerequisite {
                step,
                requirement: "application identity",
            })
    }
}
