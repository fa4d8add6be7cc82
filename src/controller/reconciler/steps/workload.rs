use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::resources::{self, DEPLOYMENT_MERGE, SERVICE_MERGE};
use crate::controller::token::ControlToken;
use crate::controller::upsert::{upsert, ObjectApi};
use crate::crd::Application;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Converges the Deployment and Service named after the workload
pub struct WorkloadStep {
    deployments: Arc<dyn ObjectApi<Deployment>>,
    services: Arc<dyn ObjectApi<Service>>,
}

impl fmt::Debug for WorkloadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadStep").finish_non_exhaustive()
    }
}

impl WorkloadStep {
    pub fn new(
        deployments: Arc<dyn ObjectApi<Deployment>>,
        services: Arc<dyn ObjectApi<Service>>,
    ) -> Self {
        Self {
            deployments,
            services,
        }
    }
}

#[async_trait]
impl ReconcilerStep for WorkloadStep {
    fn name(&self) -> &'static str {
        "workload"
    }

    async fn reconcile(&self, app: &Application, pass: &mut PassContext) -> ControlToken {
        let identity = match pass.identity(self.name()) {
            Ok(identity) => identity,
            Err(e) => return ControlToken::proceed().with_failure(e),
        };

        let deployment = resources::deployment(app, identity);
        let deployment_outcome =
            match upsert(self.deployments.as_ref(), &deployment, &DEPLOYMENT_MERGE).await {
                Ok(outcome) => outcome,
                Err(e) => return ControlToken::proceed().with_failure(e),
            };

        let service = resources::service(app, identity);
        let service_outcome = match upsert(self.services.as_ref(), &service, &SERVICE_MERGE).await
        {
            Ok(outcome) => outcome,
            Err(e) => return ControlToken::proceed().with_failure(e),
        };

        info!(
            workload = identity.workload_name.as_str(),
            deployment = deployment_outcome.as_str(),
            service = service_outcome.as_str(),
            "workload.reconciled"
        );
        ControlToken::proceed()
    }
}
