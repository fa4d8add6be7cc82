use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::token::ControlToken;
use crate::crd::Application;
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::info;

/// Finishes the pass for resources that are being deleted
///
/// Child objects carry an owner reference and are garbage collected by the
/// cluster, so there is nothing left to converge.
#[derive(Debug, Default)]
pub struct DeletionStep;

#[async_trait]
impl ReconcilerStep for DeletionStep {
    fn name(&self) -> &'static str {
        "deletion"
    }

    async fn reconcile(&self, app: &Application, _pass: &mut PassContext) -> ControlToken {
        if app.metadata.deletion_timestamp.is_none() {
            return ControlToken::proceed();
        }
        info!(
            resource.name = app.name_any().as_str(),
            resource.namespace = app.namespace().unwrap_or_default().as_str(),
            "application.deleting"
        );
        ControlToken::proceed().finish()
    }
}
