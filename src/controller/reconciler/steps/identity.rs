use crate::controller::app_info;
use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::token::ControlToken;
use crate::crd::Application;
use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, warn};

/// Resolves the application identity and stores it for later steps
#[derive(Debug, Default)]
pub struct IdentityStep;

#[async_trait]
impl ReconcilerStep for IdentityStep {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn reconcile(&self, app: &Application, pass: &mut PassContext) -> ControlToken {
        match app_info::extract(app.annotations()) {
            Ok(identity) => {
                debug!(
                    app_code = identity.app_code.as_str(),
                    environment = identity.environment.as_str(),
                    workload = identity.workload_name.as_str(),
                    "identity.resolved"
                );
                pass.identity = Some(identity);
                ControlToken::proceed()
            }
            Err(e) => {
                warn!(
                    resource.name = app.name_any().as_str(),
                    field = e.field().as_str(),
                    "identity.missing_field"
                );
                ControlToken::proceed().with_failure(e)
            }
        }
    }
}
