use super::status::{progressing, write_status, StatusWriter};
use crate::controller::error::{ObjectRef, ReconcilerError, Verb};
use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::token::ControlToken;
use crate::controller::upsert::ObjectApi;
use crate::crd::Application;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Holds the pass until the workload rollout has finished
///
/// The rollout is finished once the Deployment controller has observed the
/// latest generation and the requested replicas are both updated and ready.
/// Until then the status is set to `Progressing` and the resource is revisited
/// after the poll interval.
pub struct ReadinessStep {
    deployments: Arc<dyn ObjectApi<Deployment>>,
    status: Arc<dyn StatusWriter>,
    poll: Duration,
}

impl fmt::Debug for ReadinessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessStep")
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl ReadinessStep {
    pub fn new(
        deployments: Arc<dyn ObjectApi<Deployment>>,
        status: Arc<dyn StatusWriter>,
        poll: Duration,
    ) -> Self {
        Self {
            deployments,
            status,
            poll,
        }
    }
}

#[async_trait]
impl ReconcilerStep for ReadinessStep {
    fn name(&self) -> &'static str {
        "readiness"
    }

    async fn reconcile(&self, app: &Application, pass: &mut PassContext) -> ControlToken {
        let identity = match pass.identity(self.name()) {
            Ok(identity) => identity,
            Err(e) => return ControlToken::proceed().with_failure(e),
        };
        let namespace = app.namespace().unwrap_or_default();

        let deployment = match self
            .deployments
            .get(&namespace, &identity.workload_name)
            .await
        {
            Ok(deployment) => deployment,
            Err(e) => {
                let object = ObjectRef {
                    kind: "Deployment".to_string(),
                    namespace,
                    name: identity.workload_name.clone(),
                };
                return ControlToken::proceed()
                    .with_failure(ReconcilerError::from_api(e, object, Verb::Get));
            }
        };

        let desired = app.spec.replicas.max(0);
        let rollout = Rollout::of(&deployment);
        if rollout.is_complete(desired) {
            return ControlToken::proceed();
        }

        let ready = rollout.ready;
        info!(
            workload = identity.workload_name.as_str(),
            ready,
            updated = rollout.updated,
            observed_current = rollout.observed_current,
            desired,
            "workload.rollout_pending"
        );
        if let Err(e) = write_status(self.status.as_ref(), app, progressing(app, ready, desired)).await
        {
            return ControlToken::proceed().with_failure(e);
        }
        ControlToken::proceed().requeue_after(self.poll)
    }
}

/// Rollout progress as reported by the Deployment controller
struct Rollout {
    observed_current: bool,
    updated: i32,
    ready: i32,
}

impl Rollout {
    fn of(deployment: &Deployment) -> Self {
        let status = deployment.status.clone().unwrap_or_default();
        let generation = deployment.metadata.generation.unwrap_or(0);
        Self {
            observed_current: status.observed_generation.unwrap_or(0) >= generation,
            updated: status.updated_replicas.unwrap_or(0),
            ready: status.ready_replicas.unwrap_or(0),
        }
    }

    fn is_complete(&self, desired: i32) -> bool {
        self.observed_current && self.updated >= desired && self.ready >= desired
    }
}
