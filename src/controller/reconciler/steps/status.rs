use crate::constants::FIELD_MANAGER;
use crate::controller::error::{ApiError, ObjectRef, ReconcilerError, Verb};
use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::token::ControlToken;
use crate::controller::upsert::KubeObjectApi;
use crate::crd::{Application, ApplicationStatus, Condition};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const PHASE_PROGRESSING: &str = "Progressing";
pub const PHASE_RUNNING: &str = "Running";
const CONDITION_READY: &str = "Ready";

/// Writes the status subresource of an `Application`
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Merge-patch `status`; a resource deleted mid-pass is not an error
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ApplicationStatus,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl StatusWriter for KubeObjectApi {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ApplicationStatus,
    ) -> Result<(), ApiError> {
        let api: Api<Application> = Api::namespaced(self.client().clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        match api
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(
                    resource.name = name,
                    resource.namespace = namespace,
                    "status.skipped_deleted"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Status for a workload that is still rolling out
pub(super) fn progressing(app: &Application, ready: i32, desired: i32) -> ApplicationStatus {
    status(
        app,
        PHASE_PROGRESSING,
        format!("Waiting for rollout: {ready}/{desired} replicas ready"),
        Condition {
            r#type: CONDITION_READY.to_string(),
            status: "False".to_string(),
            last_transition_time: None,
            reason: Some("RolloutInProgress".to_string()),
            message: Some(format!("{ready}/{desired} replicas ready")),
        },
        Vec::new(),
    )
}

/// Status for a converged application
pub(super) fn running(app: &Application, addresses: Vec<String>) -> ApplicationStatus {
    let description = match addresses.first() {
        Some(address) => format!("Serving on {address}"),
        None => "Running without routed domains".to_string(),
    };
    status(
        app,
        PHASE_RUNNING,
        description,
        Condition {
            r#type: CONDITION_READY.to_string(),
            status: "True".to_string(),
            last_transition_time: None,
            reason: Some("Reconciled".to_string()),
            message: Some("Workload and routing are up to date".to_string()),
        },
        addresses,
    )
}

fn status(
    app: &Application,
    phase: &str,
    description: String,
    ready: Condition,
    addresses: Vec<String>,
) -> ApplicationStatus {
    ApplicationStatus {
        phase: Some(phase.to_string()),
        description: Some(description),
        conditions: vec![ready],
        observed_generation: app.metadata.generation,
        last_reconcile_time: None,
        addresses,
    }
}

/// Equal apart from timestamps
fn same_state(current: &ApplicationStatus, next: &ApplicationStatus) -> bool {
    let strip = |status: &ApplicationStatus| {
        let mut status = status.clone();
        status.last_reconcile_time = None;
        for condition in &mut status.conditions {
            condition.last_transition_time = None;
        }
        status
    };
    strip(current) == strip(next)
}

/// Write `next` unless the resource already reports the same state
///
/// Skipping unchanged writes keeps status updates from re-triggering the
/// watch on every pass. Returns whether a write happened.
pub(super) async fn write_status(
    writer: &dyn StatusWriter,
    app: &Application,
    mut next: ApplicationStatus,
) -> Result<bool, ReconcilerError> {
    let current = app.status.clone().unwrap_or_default();
    if same_state(&current, &next) {
        return Ok(false);
    }

    let now = chrono::Utc::now().to_rfc3339();
    for condition in &mut next.conditions {
        let unchanged = current
            .conditions
            .iter()
            .find(|c| c.r#type == condition.r#type)
            .filter(|c| c.status == condition.status);
        condition.last_transition_time = match unchanged {
            Some(previous) => previous.last_transition_time.clone(),
            None => Some(now.clone()),
        };
    }
    next.last_reconcile_time = Some(now);

    let namespace = app.namespace().unwrap_or_default();
    let name = app.name_any();
    writer
        .patch_status(&namespace, &name, &next)
        .await
        .map_err(|e| {
            ReconcilerError::from_api(
                e,
                ObjectRef {
                    kind: "Application".to_string(),
                    namespace: namespace.clone(),
                    name: name.clone(),
                },
                Verb::PatchStatus,
            )
        })?;

    debug!(
        resource.name = name.as_str(),
        phase = next.phase.as_deref().unwrap_or_default(),
        "status.updated"
    );
    Ok(true)
}

/// Reports the converged state once every earlier step succeeded
pub struct StatusStep {
    writer: Arc<dyn StatusWriter>,
}

impl fmt::Debug for StatusStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStep").finish_non_exhaustive()
    }
}

impl StatusStep {
    pub fn new(writer: Arc<dyn StatusWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl ReconcilerStep for StatusStep {
    fn name(&self) -> &'static str {
        "status"
    }

    async fn reconcile(&self, app: &Application, pass: &mut PassContext) -> ControlToken {
        let next = running(app, pass.addresses.clone());
        match write_status(self.writer.as_ref(), app, next).await {
            Ok(_) => ControlToken::proceed(),
            Err(e) => ControlToken::proceed().with_failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{application, RecordingStatusWriter};

    #[tokio::test]
    async fn test_writes_running_status_with_addresses() {
        let writer = RecordingStatusWriter::default();
        let step = StatusStep::new(Arc::new(writer.clone()));
        let mut app = application();
        app.metadata.generation = Some(3);
        let mut pass = PassContext {
            addresses: vec!["demo.example.com/".to_string()],
            ..PassContext::default()
        };

        let token = step.reconcile(&app, &mut pass).await;

        assert!(token.is_continue());
        let status = writer.last().unwrap();
        assert_eq!(status.phase.as_deref(), Some(PHASE_RUNNING));
        assert_eq!(status.observed_generation, Some(3));
        assert_eq!(status.addresses, vec!["demo.example.com/".to_string()]);
        assert_eq!(status.conditions[0].status, "True");
        assert!(status.conditions[0].last_transition_time.is_some());
        assert!(status.last_reconcile_time.is_some());
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_rewritten() {
        let writer = RecordingStatusWriter::default();
        let step = StatusStep::new(Arc::new(writer.clone()));
        let mut app = application();
        let first = step.reconcile(&app, &mut PassContext::default()).await;

        app.status = writer.last();
        let second = step.reconcile(&app, &mut PassContext::default()).await;

        assert!(first.is_continue());
        assert!(second.is_continue());
        assert_eq!(writer.count(), 1);
    }

    #[tokio::test]
    async fn test_transition_time_kept_while_condition_holds() {
        let writer = RecordingStatusWriter::default();
        let mut app = application();
        write_status(&writer, &app, running(&app, Vec::new()))
            .await
            .unwrap();
        let first = writer.last().unwrap();

        app.status = Some(first.clone());
        write_status(&writer, &app, running(&app, vec!["demo.example.com/".into()]))
            .await
            .unwrap();
        let second = writer.last().unwrap();

        assert_eq!(writer.count(), 2);
        assert_eq!(
            second.conditions[0].last_transition_time,
            first.conditions[0].last_transition_time
        );
    }
}
