//! # Reconciler
//!
//! Reconciliation of `Application` resources.
//!
//! A pass runs an ordered list of [`ReconcilerStep`]s through the
//! [`Orchestrator`]. Each step returns a control token; the first token that
//! asks to abort ends the pass and decides how the resource is rescheduled.
//!
//! ## Reconciliation Flow
//!
//! 1. Stop early when the resource is being deleted
//! 2. Extract the application identity from annotations
//! 3. Upsert the Deployment and Service
//! 4. Derive domain groups and upsert one Ingress per domain
//! 5. Requeue until the rollout is ready
//! 6. Update status

mod orchestrator;
mod reconcile;
mod step;
pub mod steps;
mod types;

pub use crate::controller::error::ReconcilerError;
pub use orchestrator::{Orchestrator, PassReport, PassState};
pub use reconcile::reconcile;
pub use step::{PassContext, ReconcilerStep};
pub use steps::StatusWriter;
pub use types::{build_orchestrator, BackoffState, ClusterApis, Reconciler};
