use crate::controller::domain::{self, DomainSettings};
use crate::controller::reconciler::step::{PassContext, ReconcilerStep};
use crate::controller::resources::{self, INGRESS_MERGE};
use crate::controller::token::ControlToken;
use crate::controller::upsert::{prune, upsert, ObjectApi, PruneApi, UpsertOutcome};
use crate::crd::Application;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Converges one Ingress per routed domain
///
/// The whole domain spec is validated before the first upsert, so an invalid
/// custom entry never leaves a half-applied set of Ingresses behind. Once
/// every desired Ingress is in place, managed Ingresses of the same workload
/// that are owned by the application and no longer desired are deleted.
pub struct DomainsStep {
    ingresses: Arc<dyn ObjectApi<Ingress>>,
    pruner: Arc<dyn PruneApi<Ingress>>,
    settings: DomainSettings,
    ingress_class_name: Option<String>,
}

impl fmt::Debug for DomainsStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainsStep")
            .field("settings", &self.settings)
            .field("ingress_class_name", &self.ingress_class_name)
            .finish_non_exhaustive()
    }
}

impl DomainsStep {
    pub fn new(
        ingresses: Arc<dyn ObjectApi<Ingress>>,
        pruner: Arc<dyn PruneApi<Ingress>>,
        settings: DomainSettings,
        ingress_class_name: Option<String>,
    ) -> Self {
        Self {
            ingresses,
            pruner,
            settings,
            ingress_class_name,
        }
    }
}

#[async_trait]
impl ReconcilerStep for DomainsStep {
    fn name(&self) -> &'static str {
        "domains"
    }

    async fn reconcile(&self, app: &Application, pass: &mut PassContext) -> ControlToken {
        let identity = match pass.identity(self.name()) {
            Ok(identity) => identity,
            Err(e) => return ControlToken::proceed().with_failure(e),
        };

        let groups = match domain::build(identity, &app.spec.domains, &self.settings) {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "domains.invalid");
                return ControlToken::proceed().with_failure(e);
            }
        };

        let desired = resources::ingresses(
            app,
            identity,
            &groups,
            self.ingress_class_name.as_deref(),
        );
        let mut changed = 0usize;
        for ingress in &desired {
            match upsert(self.ingresses.as_ref(), ingress, &INGRESS_MERGE).await {
                Ok(UpsertOutcome::Unchanged) => {}
                Ok(_) => changed += 1,
                Err(e) => return ControlToken::proceed().with_failure(e),
            }
        }

        let namespace = app.namespace().unwrap_or_default();
        let keep: BTreeSet<String> = desired.iter().map(ResourceExt::name_any).collect();
        let pruned = match prune(
            self.pruner.as_ref(),
            &namespace,
            &resources::managed_selector(identity),
            |ingress: &Ingress| {
                !keep.contains(&ingress.name_any()) && resources::is_owned_by(ingress, app)
            },
        )
        .await
        {
            Ok(pruned) => pruned.len(),
            Err(e) => return ControlToken::proceed().with_failure(e),
        };

        info!(
            ingresses = desired.len(),
            changed, pruned, "domains.reconciled"
        );

        pass.addresses = resources::addresses(&groups);
        ControlToken::proceed()
    }
}
