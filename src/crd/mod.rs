//! # Custom Resource Definitions
//!
//! CRD types for the application operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification and default values
//! - `domain.rs` - Routing entries (`spec.domains`)
//! - `status.rs` - Status types for tracking reconciliation state

mod domain;
mod spec;
mod status;

// Re-export all public types
pub use domain::{CustomDomainSpec, DomainGroupSpec, DomainSourceType};
pub use spec::{
    default_false, default_replicas, default_target_port, Application, ApplicationSpec,
};
pub use status::{ApplicationStatus, Condition};
