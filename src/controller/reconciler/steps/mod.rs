//! # Steps
//!
//! Concrete reconciler steps, in the order the operator runs them:
//!
//! 1. `deletion` - stop early for resources being deleted
//! 2. `identity` - resolve the application identity from annotations
//! 3. `workload` - converge the Deployment and Service
//! 4. `domains` - converge one Ingress per routed domain
//! 5. `readiness` - wait for the rollout to finish
//! 6. `status` - report the converged state

mod deletion;
mod domains;
mod identity;
mod readiness;
mod status;
mod workload;

pub use deletion::DeletionStep;
pub use domains::DomainsStep;
pub use identity::IdentityStep;
pub use readiness::ReadinessStep;
pub use status::{StatusStep, StatusWriter};
pub use workload::WorkloadStep;
